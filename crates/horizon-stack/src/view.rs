//! Item views and the view registry.
//!
//! An [`ItemView`] is the platform cell for one item: it is configured with
//! an item and reports the size it wants for a given container. Views are
//! created by kind through a [`ViewRegistry`], which is an explicit object
//! handed to each component rather than process-wide state.
//!
//! # Example
//!
//! ```
//! use horizon_stack::view::{FixedSizeView, ViewRegistry};
//! use horizon_stack::model::Item;
//! use horizon_stack::Size;
//!
//! let mut registry = ViewRegistry::new();
//! registry.register("row", || FixedSizeView::with_height(44.0));
//!
//! let view = registry.make("row").unwrap();
//! let size = view.compute_size(&Item::new("Inbox"), Size::new(320.0, 0.0));
//! assert_eq!(size, Size::new(320.0, 44.0));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::geometry::Size;
use crate::model::Item;

/// A rendered cell for one item.
pub trait ItemView: Send + Sync {
    /// Configure the view with an item's content.
    fn configure(&self, item: &Item);

    /// Returns the size this view wants for `item` inside `container`.
    ///
    /// The default honours the item's requested size and fills the
    /// container width when none is requested.
    fn compute_size(&self, item: &Item, container: Size) -> Size {
        Size::new(
            if item.size.width > 0.0 {
                item.size.width
            } else {
                container.width
            },
            item.size.height,
        )
    }
}

/// Creates a fresh view.
pub type ViewFactory = Arc<dyn Fn() -> Arc<dyn ItemView> + Send + Sync>;

/// Kind-string to view-factory table.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    factories: HashMap<String, ViewFactory>,
    default_factory: Option<ViewFactory>,
}

impl ViewRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a view kind, replacing any previous one.
    pub fn register<V, F>(&mut self, kind: impl Into<String>, factory: F)
    where
        V: ItemView + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        let factory: ViewFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn ItemView>);
        self.factories.insert(kind.into(), factory);
    }

    /// Register the factory used for kinds without an explicit entry.
    pub fn register_default<V, F>(&mut self, factory: F)
    where
        V: ItemView + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.default_factory = Some(Arc::new(move || Arc::new(factory()) as Arc<dyn ItemView>));
    }

    /// Returns `true` if `kind` has an explicit entry.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Returns `true` if a default factory is registered.
    pub fn has_default(&self) -> bool {
        self.default_factory.is_some()
    }

    /// Number of explicitly registered kinds.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Create a view for `kind`, falling back to the default factory.
    pub fn make(&self, kind: &str) -> Option<Arc<dyn ItemView>> {
        self.factories
            .get(kind)
            .or(self.default_factory.as_ref())
            .map(|factory| factory())
    }
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("ViewRegistry")
            .field("kinds", &kinds)
            .field("has_default", &self.default_factory.is_some())
            .finish()
    }
}

/// A view with a fixed preferred height.
///
/// Also records the last item it was configured with, which makes it a
/// convenient cell for headless hosts.
#[derive(Debug, Default)]
pub struct FixedSizeView {
    height: f64,
    configured: Mutex<Option<Item>>,
    configure_count: Mutex<usize>,
}

impl FixedSizeView {
    /// Create a view that prefers `height`.
    pub fn with_height(height: f64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    /// The item this view was last configured with.
    pub fn configured_item(&self) -> Option<Item> {
        self.configured.lock().clone()
    }

    /// How many times `configure` has been called.
    pub fn configure_count(&self) -> usize {
        *self.configure_count.lock()
    }
}

impl ItemView for FixedSizeView {
    fn configure(&self, item: &Item) {
        *self.configured.lock() = Some(item.clone());
        *self.configure_count.lock() += 1;
    }

    fn compute_size(&self, item: &Item, container: Size) -> Size {
        Size::new(
            if item.size.width > 0.0 {
                item.size.width
            } else {
                container.width
            },
            if item.size.height > 0.0 {
                item.size.height
            } else {
                self.height
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_fallback_to_default() {
        let mut registry = ViewRegistry::new();
        assert!(registry.make("row").is_none());

        registry.register_default(|| FixedSizeView::with_height(10.0));
        registry.register("card", || FixedSizeView::with_height(200.0));

        let container = Size::new(100.0, 0.0);
        let item = Item::new("x");
        assert_eq!(
            registry.make("card").unwrap().compute_size(&item, container).height,
            200.0
        );
        assert_eq!(
            registry.make("row").unwrap().compute_size(&item, container).height,
            10.0
        );
        assert!(registry.contains("card"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_fixed_view_prefers_requested_size() {
        let view = FixedSizeView::with_height(44.0);
        let item = Item::new("x").with_size(Size::new(50.0, 80.0));
        assert_eq!(
            view.compute_size(&item, Size::new(320.0, 0.0)),
            Size::new(50.0, 80.0)
        );

        view.configure(&item);
        assert_eq!(view.configure_count(), 1);
        assert_eq!(view.configured_item(), Some(item));
    }
}
