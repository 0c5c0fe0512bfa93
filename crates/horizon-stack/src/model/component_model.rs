//! The declarative model backing a component.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::item::Item;
use super::layout::{ComponentKind, Layout};

/// Ordered items plus the layout metadata of one component.
///
/// `items` is the source of truth for every index-based operation. After any
/// committed mutation, item indices are dense: `items[i].index == i`.
///
/// # Example
///
/// ```
/// use horizon_stack::model::{ComponentKind, ComponentModel, Item};
///
/// let model = ComponentModel::new(ComponentKind::Grid)
///     .with_span(2.0)
///     .with_items(vec![Item::new("A"), Item::new("B"), Item::new("C")]);
///
/// assert_eq!(model.items[2].index, 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub kind: ComponentKind,
    /// Number of columns (grid) or visible items (carousel). Zero means
    /// "natural width".
    pub span: f64,
    pub layout: Layout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Item>,
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

/// The first difference found between two component models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentModelDiff {
    None,
    Identifier,
    Kind,
    /// Span or layout changed.
    Layout,
    Header,
    Footer,
    Meta,
    /// Only the items differ.
    Items,
}

impl ComponentModel {
    /// Create an empty model of the given kind.
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Set the identifier.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Set the span.
    pub fn with_span(mut self, span: f64) -> Self {
        self.span = span;
        self
    }

    /// Set the layout.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the header item.
    pub fn with_header(mut self, header: Item) -> Self {
        self.header = Some(header);
        self
    }

    /// Set the footer item.
    pub fn with_footer(mut self, footer: Item) -> Self {
        self.footer = Some(footer);
        self
    }

    /// Set the items, renumbering their indices.
    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self.refresh_indexes();
        self
    }

    /// Reassign `index` on every item to match its position.
    pub fn refresh_indexes(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.index = index;
        }
    }

    /// Returns `true` if every item's index matches its position.
    pub fn has_dense_indexes(&self) -> bool {
        self.items
            .iter()
            .enumerate()
            .all(|(index, item)| item.index == index)
    }

    /// Compare against the previous version of this model.
    pub fn diff(&self, old: &ComponentModel) -> ComponentModelDiff {
        if self.identifier != old.identifier {
            ComponentModelDiff::Identifier
        } else if self.kind != old.kind {
            ComponentModelDiff::Kind
        } else if self.span != old.span || self.layout != old.layout {
            ComponentModelDiff::Layout
        } else if self.header != old.header {
            ComponentModelDiff::Header
        } else if self.footer != old.footer {
            ComponentModelDiff::Footer
        } else if self.meta != old.meta {
            ComponentModelDiff::Meta
        } else if self.items != old.items {
            ComponentModelDiff::Items
        } else {
            ComponentModelDiff::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_items_renumbers() {
        let mut items = vec![Item::new("A"), Item::new("B")];
        items[0].index = 7;
        let model = ComponentModel::new(ComponentKind::List).with_items(items);
        assert!(model.has_dense_indexes());
    }

    #[test]
    fn test_diff_detects_item_only_change() {
        let old = ComponentModel::new(ComponentKind::List).with_items(vec![Item::new("A")]);
        let new = ComponentModel::new(ComponentKind::List).with_items(vec![Item::new("B")]);
        assert_eq!(new.diff(&old), ComponentModelDiff::Items);
        assert_eq!(old.diff(&old.clone()), ComponentModelDiff::None);

        let grid = old.clone().with_span(2.0);
        assert_eq!(grid.diff(&old), ComponentModelDiff::Layout);
    }

    #[test]
    fn test_decode_kind_and_layout() {
        let model: ComponentModel = serde_json::from_value(json!({
            "kind": "carousel",
            "span": 3,
            "layout": { "item_spacing": 8, "inset": { "left": 16, "right": 16 } },
            "items": [{ "title": "One" }, { "title": "Two" }]
        }))
        .unwrap();

        assert_eq!(model.kind, ComponentKind::Carousel);
        assert_eq!(model.span, 3.0);
        assert_eq!(model.layout.inset.horizontal(), 32.0);
        assert_eq!(model.items.len(), 2);
    }
}
