//! Human-readable dumps of a component tree.
//!
//! ```
//! use horizon_stack::Controller;
//! use horizon_stack::model::{ComponentKind, ComponentModel, Item};
//!
//! let controller = Controller::builder()
//!     .model(
//!         ComponentModel::new(ComponentKind::List)
//!             .with_identifier("inbox")
//!             .with_items(vec![Item::new("Hello"), Item::new("World")]),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let tree = controller.debug_tree();
//! assert!(tree.contains("inbox"));
//! assert!(tree.contains("Hello"));
//! ```

use std::fmt::Write;
use std::sync::Arc;

use crate::component::Component;
use crate::model::{ComponentModel, Item};

/// Branch drawing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    Ascii,
    /// Box-drawing characters.
    #[default]
    Unicode,
    /// Dash-prefixed lines.
    Compact,
}

/// What to include in a tree dump.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    pub style: TreeStyle,
    /// Print item rows, not just component headers.
    pub show_items: bool,
    /// Print measured sizes.
    pub show_sizes: bool,
    /// Maximum depth to descend into composite children (`None` for all).
    pub max_depth: Option<usize>,
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_items: true,
            show_sizes: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Component headers only.
    pub fn minimal() -> Self {
        Self {
            show_items: false,
            show_sizes: false,
            ..Default::default()
        }
    }
}

/// Formats components and their items as an indented tree.
#[derive(Debug, Clone, Default)]
pub struct ComponentTreeDebug {
    options: TreeFormatOptions,
}

impl ComponentTreeDebug {
    /// Create a formatter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a formatter with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format every component in order.
    pub fn format(&self, components: &[Arc<Component>]) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Components ({}):", components.len());
        if components.is_empty() {
            let _ = writeln!(output, "  (empty)");
            return output;
        }
        let last = components.len() - 1;
        for (index, component) in components.iter().enumerate() {
            let frame = component.frame();
            let mut line = self.describe_model(&component.model(), index);
            if self.options.show_sizes {
                let _ = write!(line, " y={} h={}", frame.y, component.height());
            }
            self.push_line(&mut output, 1, index == last, &line);
            if self.options.show_items {
                self.format_items(&component.model(), 2, &mut output);
            }
        }
        output
    }

    /// Format a bare model.
    pub fn format_model(&self, model: &ComponentModel) -> String {
        let mut output = String::new();
        output.push_str(&self.describe_model(model, 0));
        output.push('\n');
        if self.options.show_items {
            self.format_items(model, 1, &mut output);
        }
        output
    }

    fn describe_model(&self, model: &ComponentModel, index: usize) -> String {
        let name = model.identifier.as_deref().unwrap_or("(unnamed)");
        format!(
            "#{index} {name} ({}, {} items)",
            model.kind.as_str(),
            model.items.len()
        )
    }

    fn format_items(&self, model: &ComponentModel, depth: usize, output: &mut String) {
        if let Some(max) = self.options.max_depth
            && depth > max + 1
        {
            return;
        }
        let count = model.items.len();
        for (position, item) in model.items.iter().enumerate() {
            let line = self.describe_item(item);
            self.push_line(output, depth, position + 1 == count, &line);
            for (child_index, child) in item.children.iter().enumerate() {
                let child_line = self.describe_model(child, child_index);
                self.push_line(output, depth + 1, child_index + 1 == item.children.len(), &child_line);
                self.format_items(child, depth + 2, output);
            }
        }
    }

    fn describe_item(&self, item: &Item) -> String {
        let mut line = format!("[{}] {}", item.index, item.title);
        if !item.kind.is_empty() {
            let _ = write!(line, " <{}>", item.kind);
        }
        if self.options.show_sizes {
            let _ = write!(line, " {}x{}", item.size.width, item.size.height);
        }
        line
    }

    fn push_line(&self, output: &mut String, depth: usize, is_last: bool, text: &str) {
        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(text);
        output.push('\n');
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }
        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = String::new();
        for _ in 0..depth - 1 {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix
    }
}
