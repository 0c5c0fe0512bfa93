//! Controller configuration.
//!
//! Configuration is plain data with sensible defaults and can be loaded
//! from TOML:
//!
//! ```
//! use horizon_stack::ControllerConfig;
//!
//! let config = ControllerConfig::from_toml_str(
//!     r#"
//!     navigation_bar_height = 44.0
//!     stretch_last_component = true
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.navigation_bar_height, 44.0);
//! assert_eq!(config.tab_bar_height, 0.0);
//! ```

use horizon_stack_core::DispatcherConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::manager::DEFAULT_COMPOSITE_KIND;

/// Settings for a [`Controller`](crate::Controller).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Height of the navigation bar covering the top of the viewport.
    pub navigation_bar_height: f64,
    /// Height of the tab bar covering the bottom of the viewport.
    pub tab_bar_height: f64,
    /// Stretch the last component to fill the remaining viewport.
    pub stretch_last_component: bool,
    /// Height used for items whose kind has no registered view.
    pub default_item_height: f64,
    /// Item kind that marks composite items.
    pub composite_kind: String,
    /// Background pool size. `None` uses one thread per core.
    pub background_threads: Option<usize>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            navigation_bar_height: 0.0,
            tab_bar_height: 0.0,
            stretch_last_component: false,
            default_item_height: 44.0,
            composite_kind: DEFAULT_COMPOSITE_KIND.to_string(),
            background_threads: None,
        }
    }
}

impl ControllerConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Vertical space taken by chrome (navigation and tab bars).
    pub fn chrome_height(&self) -> f64 {
        self.navigation_bar_height + self.tab_bar_height
    }

    /// Dispatcher settings derived from this configuration.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        match self.background_threads {
            Some(threads) => DispatcherConfig::with_background_threads(threads),
            None => DispatcherConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackError;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ControllerConfig::from_toml_str("").unwrap(), ControllerConfig::default());
    }

    #[test]
    fn test_full_document() {
        let config = ControllerConfig::from_toml_str(
            r#"
            navigation_bar_height = 64.0
            tab_bar_height = 49.0
            default_item_height = 60.0
            composite_kind = "nested"
            background_threads = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.chrome_height(), 113.0);
        assert_eq!(config.composite_kind, "nested");
        assert_eq!(config.background_threads, Some(2));
    }

    #[test]
    fn test_malformed_document() {
        let err = ControllerConfig::from_toml_str("tab_bar_height = \"tall\"").unwrap_err();
        assert!(matches!(err, StackError::Config(_)));
    }
}
