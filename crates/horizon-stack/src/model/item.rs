//! The item model: one row or cell of a component.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::component_model::ComponentModel;
use crate::geometry::Size;

/// Value-type model for one row/cell.
///
/// Items are replaced wholesale on update. The engine only ever patches two
/// fields in place: `index` (renumbering after structural changes) and
/// `size` (measurement).
///
/// # Equality
///
/// Two items are equal when their content matches. `index` and `size` are
/// layout state and take no part in the comparison, so a freshly decoded
/// item compares equal to its measured counterpart. The flip side is that
/// an item whose only change is its requested `size` compares equal too;
/// resize such items with an explicit `update`.
///
/// # Example
///
/// ```
/// use horizon_stack::model::Item;
///
/// let item = Item::new("Inbox").with_kind("list-row").with_height(44.0);
/// assert_eq!(item.title, "Inbox");
/// assert_eq!(item, Item::new("Inbox").with_kind("list-row"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Position within the owning component.
    pub index: usize,
    /// Stable identity, if the host provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// View kind used to look up the item's view in the registry.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Requested or measured render size.
    pub size: Size,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
    /// Nested component models for composite items.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentModel>,
}

/// The first content difference found between two items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemDiff {
    /// No content difference.
    None,
    /// The view kind changed.
    Kind,
    Identifier,
    Title,
    Subtitle,
    Text,
    Image,
    Action,
    Meta,
    /// Nested component models changed.
    Children,
    /// Present only in the new collection.
    New,
    /// Present only in the old collection.
    Removed,
}

impl Item {
    /// Create an item with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the view kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set the identifier.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Set the subtitle.
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    /// Set the body text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the requested size.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    /// Set the requested height, leaving the width to the layout.
    pub fn with_height(mut self, height: f64) -> Self {
        self.size.height = height;
        self
    }

    /// Set a metadata value.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Set the nested component models.
    pub fn with_children(mut self, children: Vec<ComponentModel>) -> Self {
        self.children = children;
        self
    }

    /// Look up a metadata value.
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Compare against the previous version of this item.
    ///
    /// Returns the first difference in a fixed priority order, kind first,
    /// since a kind change forces a different view.
    pub fn diff(&self, old: &Item) -> ItemDiff {
        if self.kind != old.kind {
            ItemDiff::Kind
        } else if self.identifier != old.identifier {
            ItemDiff::Identifier
        } else if self.children != old.children {
            ItemDiff::Children
        } else if self.title != old.title {
            ItemDiff::Title
        } else if self.subtitle != old.subtitle {
            ItemDiff::Subtitle
        } else if self.text != old.text {
            ItemDiff::Text
        } else if self.image != old.image {
            ItemDiff::Image
        } else if self.action != old.action {
            ItemDiff::Action
        } else if self.meta != old.meta {
            ItemDiff::Meta
        } else {
            ItemDiff::None
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.diff(other) == ItemDiff::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_ignores_layout_state() {
        let mut a = Item::new("A").with_kind("row");
        let mut b = a.clone();
        a.index = 3;
        a.size = Size::new(320.0, 44.0);
        b.index = 0;
        assert_eq!(a, b);
    }

    #[test]
    fn test_diff_priority() {
        let old = Item::new("A").with_kind("row");
        assert_eq!(Item::new("B").with_kind("card").diff(&old), ItemDiff::Kind);
        assert_eq!(Item::new("B").with_kind("row").diff(&old), ItemDiff::Title);
        assert_eq!(
            Item::new("A").with_kind("row").with_meta("k", 1).diff(&old),
            ItemDiff::Meta
        );
        assert_eq!(
            Item::new("A")
                .with_kind("row")
                .with_children(vec![ComponentModel::default()])
                .diff(&old),
            ItemDiff::Children
        );
        assert_eq!(old.clone().diff(&old), ItemDiff::None);
    }

    #[test]
    fn test_decode_with_defaults() {
        let item: Item = serde_json::from_value(json!({
            "title": "Hello",
            "kind": "row",
            "size": { "height": 60 },
            "meta": { "badge": 3 }
        }))
        .unwrap();

        assert_eq!(item.title, "Hello");
        assert_eq!(item.size, Size::new(0.0, 60.0));
        assert_eq!(item.meta("badge"), Some(&json!(3)));
        assert!(item.children.is_empty());
        assert_eq!(item.index, 0);
    }
}
