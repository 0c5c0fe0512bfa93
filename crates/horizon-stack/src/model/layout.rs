//! Per-component layout configuration.

use serde::{Deserialize, Serialize};

use crate::geometry::Insets;

/// The kind of scrollable region a component renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Vertical list, one item per row.
    #[default]
    List,
    /// Grid of `span` columns.
    Grid,
    /// Horizontally scrolling row of items.
    Carousel,
}

impl ComponentKind {
    /// Lowercase name as used in serialized models.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Grid => "grid",
            Self::Carousel => "carousel",
        }
    }
}

/// Spacing and insets for a component's content.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Horizontal gap between items on the same row.
    pub item_spacing: f64,
    /// Vertical gap between rows.
    pub line_spacing: f64,
    pub inset: Insets,
}

impl Layout {
    /// Set the item spacing.
    pub fn with_item_spacing(mut self, spacing: f64) -> Self {
        self.item_spacing = spacing;
        self
    }

    /// Set the line spacing.
    pub fn with_line_spacing(mut self, spacing: f64) -> Self {
        self.line_spacing = spacing;
        self
    }

    /// Set the content insets.
    pub fn with_inset(mut self, inset: Insets) -> Self {
        self.inset = inset;
        self
    }
}
