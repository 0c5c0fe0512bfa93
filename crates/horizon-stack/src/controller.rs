//! The controller: an ordered, vertically stacked group of components.
//!
//! A [`Controller`] owns its components and the adapters that render them.
//! It routes mutations to components by index, keeps their frames stacked
//! below the navigation bar, and reconciles whole documents of component
//! models against what is on screen.
//!
//! # Example
//!
//! ```
//! use horizon_stack::{Animation, Controller, Size};
//! use horizon_stack::model::{ComponentKind, ComponentModel, Item};
//!
//! let controller = Controller::builder()
//!     .model(ComponentModel::new(ComponentKind::List).with_items(vec![Item::new("Inbox")]))
//!     .build()
//!     .unwrap();
//! controller.setup(Size::new(320.0, 480.0));
//!
//! controller.append(0, Item::new("Outbox"), Animation::Automatic, None);
//! controller.dispatcher().run_until_idle();
//!
//! assert_eq!(controller.component_at(0).unwrap().item_count(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use horizon_stack_core::{ConnectionId, Dispatcher, PerfSpan, Signal};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::component::Component;
use crate::config::ControllerConfig;
use crate::debug::ComponentTreeDebug;
use crate::error::{Result, StackError};
use crate::geometry::{Rect, Size};
use crate::interface::{Animation, Completion, CompletionGroup, UserInterface, complete};
use crate::manager::{ComponentManager, CompositeReconciler};
use crate::model::{ComponentModel, ComponentModelDiff, Item};
use crate::view::{FixedSizeView, ViewRegistry};

/// Creates the adapter that renders a component.
pub type InterfaceFactory = Arc<dyn Fn(&Arc<Component>) -> Arc<dyn UserInterface> + Send + Sync>;

/// Signals emitted by a controller.
#[derive(Default)]
pub struct ControllerSignals {
    /// Emitted after every layout pass with the new content height.
    pub layout_changed: Signal<f64>,
    /// Emitted when components are added, removed or replaced.
    pub components_changed: Signal<()>,
}

struct ComponentEntry {
    component: Arc<Component>,
    interface: Option<Arc<dyn UserInterface>>,
    layout_connection: ConnectionId,
}

impl ComponentEntry {
    fn detach(&self) {
        self.component
            .signals()
            .layout_requested
            .disconnect(self.layout_connection);
    }
}

#[derive(Debug, Default)]
struct LayoutState {
    viewport: Size,
    content_height: f64,
}

struct ControllerInner {
    entries: RwLock<Vec<ComponentEntry>>,
    manager: ComponentManager,
    registry: Arc<ViewRegistry>,
    config: ControllerConfig,
    interface_factory: Option<InterfaceFactory>,
    layout: RwLock<LayoutState>,
    signals: ControllerSignals,
}

/// Builder for [`Controller`].
#[derive(Default)]
pub struct ControllerBuilder {
    models: Vec<ComponentModel>,
    dispatcher: Option<Dispatcher>,
    registry: Option<ViewRegistry>,
    config: ControllerConfig,
    interface_factory: Option<InterfaceFactory>,
    reconciler: Option<Arc<dyn CompositeReconciler>>,
}

impl ControllerBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one component model.
    pub fn model(mut self, model: ComponentModel) -> Self {
        self.models.push(model);
        self
    }

    /// Add several component models.
    pub fn models(mut self, models: impl IntoIterator<Item = ComponentModel>) -> Self {
        self.models.extend(models);
        self
    }

    /// Decode component models from a JSON document and add them.
    ///
    /// The document is either an array of models or an object with a
    /// `components` array.
    pub fn json(self, json: &str) -> Result<Self> {
        let models = decode_models(json)?;
        Ok(self.models(models))
    }

    /// Schedule work on an existing dispatcher.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Measure items with `registry`.
    pub fn registry(mut self, registry: ViewRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use `config`.
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Create an adapter for every component with `factory`.
    pub fn interface_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Arc<Component>) -> Arc<dyn UserInterface> + Send + Sync + 'static,
    {
        self.interface_factory = Some(Arc::new(factory));
        self
    }

    /// Hand composite updates to `reconciler`.
    pub fn reconciler(mut self, reconciler: Arc<dyn CompositeReconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Build the controller.
    ///
    /// Creates a dispatcher owned by the calling thread unless one was
    /// supplied.
    pub fn build(self) -> Result<Controller> {
        let dispatcher = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => Dispatcher::with_config(self.config.dispatcher_config())?,
        };

        let mut registry = self.registry.unwrap_or_default();
        if !registry.has_default() {
            let height = self.config.default_item_height;
            registry.register_default(move || FixedSizeView::with_height(height));
        }

        let mut manager =
            ComponentManager::new(dispatcher).with_composite_kind(self.config.composite_kind.clone());
        if let Some(reconciler) = self.reconciler {
            manager = manager.with_reconciler(reconciler);
        }

        let inner = Arc::new(ControllerInner {
            entries: RwLock::new(Vec::new()),
            manager,
            registry: Arc::new(registry),
            config: self.config,
            interface_factory: self.interface_factory,
            layout: RwLock::new(LayoutState::default()),
            signals: ControllerSignals::default(),
        });

        let entries: Vec<ComponentEntry> = self
            .models
            .into_iter()
            .enumerate()
            .map(|(index, model)| ControllerInner::attach(&inner, model, index))
            .collect();
        tracing::debug!(
            target: "horizon_stack::controller",
            components = entries.len(),
            "controller built"
        );
        *inner.entries.write() = entries;

        Ok(Controller { inner })
    }
}

/// An ordered collection of components stacked vertically.
///
/// Cheap to clone; clones share the same components.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

impl Controller {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    /// Build a controller with default settings from a JSON document.
    ///
    /// Malformed input is an error; no controller is created.
    pub fn from_json(json: &str) -> Result<Self> {
        ControllerBuilder::new().json(json)?.build()
    }

    /// The dispatcher all components schedule on.
    pub fn dispatcher(&self) -> &Dispatcher {
        self.inner.manager.dispatcher()
    }

    /// The shared mutation engine.
    pub fn manager(&self) -> &ComponentManager {
        &self.inner.manager
    }

    /// The active configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// The controller's signals.
    pub fn signals(&self) -> &ControllerSignals {
        &self.inner.signals
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// The component at `index`.
    pub fn component_at(&self, index: usize) -> Option<Arc<Component>> {
        self.inner
            .entries
            .read()
            .get(index)
            .map(|entry| entry.component.clone())
    }

    /// The first component matching `predicate`.
    pub fn component_where<P>(&self, predicate: P) -> Option<Arc<Component>>
    where
        P: Fn(&Component) -> bool,
    {
        self.inner
            .entries
            .read()
            .iter()
            .find(|entry| predicate(&entry.component))
            .map(|entry| entry.component.clone())
    }

    /// All components in order.
    pub fn components(&self) -> Vec<Arc<Component>> {
        self.inner.components()
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// The adapter rendering the component at `index`.
    pub fn interface_at(&self, index: usize) -> Option<Arc<dyn UserInterface>> {
        self.inner
            .entries
            .read()
            .get(index)
            .and_then(|entry| entry.interface.clone())
    }

    /// Snapshot of every component model.
    pub fn models(&self) -> Vec<ComponentModel> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|entry| entry.component.model())
            .collect()
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Assign indices, measure every component against `viewport` and run
    /// the first layout pass.
    pub fn setup(&self, viewport: Size) {
        tracing::debug!(
            target: "horizon_stack::controller",
            width = viewport.width,
            height = viewport.height,
            "setup"
        );
        self.inner.layout.write().viewport = viewport;
        let components = self.components();
        for (index, component) in components.iter().enumerate() {
            component.set_index(index);
            component.layout(self.inner.component_size());
        }
        self.inner.relayout();
    }

    /// Adopt a new viewport size and relayout.
    pub fn size_changed(&self, size: Size) {
        self.inner.layout.write().viewport = size;
        for component in self.components() {
            component.layout(self.inner.component_size());
        }
        self.inner.relayout();
    }

    /// Recompute frames now.
    pub fn layout(&self) {
        self.inner.relayout();
    }

    /// The current viewport.
    pub fn viewport(&self) -> Size {
        self.inner.layout.read().viewport
    }

    /// Total height of the stacked components.
    pub fn content_height(&self) -> f64 {
        self.inner.layout.read().content_height
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Append `item` to the component at `component`.
    pub fn append(&self, component: usize, item: Item, animation: Animation, completion: Option<Completion>) {
        self.route(component, completion, |target, completion| {
            target.append(item, animation, completion)
        });
    }

    /// Append `items` to the component at `component`.
    pub fn append_items(
        &self,
        component: usize,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.append_items(items, animation, completion)
        });
    }

    /// Prepend `items` to the component at `component`.
    pub fn prepend_items(
        &self,
        component: usize,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.prepend_items(items, animation, completion)
        });
    }

    /// Insert `item` at `at` in the component at `component`.
    pub fn insert(
        &self,
        component: usize,
        item: Item,
        at: usize,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.insert(item, at, animation, completion)
        });
    }

    /// Replace the item at `at` in the component at `component`.
    pub fn update(
        &self,
        component: usize,
        item: Item,
        at: usize,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.update(item, at, animation, completion)
        });
    }

    /// Delete the item at `at` in the component at `component`.
    pub fn delete(&self, component: usize, at: usize, animation: Animation, completion: Option<Completion>) {
        self.route(component, completion, |target, completion| {
            target.delete(at, animation, completion)
        });
    }

    /// Delete the items at `indexes` in the component at `component`.
    pub fn delete_indexes(
        &self,
        component: usize,
        indexes: Vec<usize>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.delete_indexes(indexes, animation, completion)
        });
    }

    /// Delete the first item equal to `item` in the component at `component`.
    pub fn delete_item(
        &self,
        component: usize,
        item: Item,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.delete_item(item, animation, completion)
        });
    }

    /// Reload `indexes` (or everything) in the component at `component`.
    pub fn reload(
        &self,
        component: usize,
        indexes: Option<Vec<usize>>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.reload(indexes, animation, completion)
        });
    }

    /// Replace the items of the component at `component` if they differ.
    pub fn reload_if_needed(
        &self,
        component: usize,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.route(component, completion, |target, completion| {
            target.reload_if_needed(items, animation, completion)
        });
    }

    fn route<F>(&self, index: usize, completion: Option<Completion>, operation: F)
    where
        F: FnOnce(&Arc<Component>, Option<Completion>),
    {
        match self.component_at(index) {
            Some(component) => operation(&component, completion),
            None => {
                tracing::debug!(target: "horizon_stack::controller", index, "no component at index");
                self.dispatcher().main(move || complete(completion));
            }
        }
    }

    // =========================================================================
    // Whole-document operations
    // =========================================================================

    /// Reload every component without animation, one after another, then
    /// fire `completion` once.
    pub fn reload_all(&self, completion: Option<Completion>) {
        let pending: VecDeque<Arc<Component>> = self.components().into();
        if pending.is_empty() {
            self.dispatcher().main(move || complete(completion));
            return;
        }
        reload_in_sequence(pending, completion);
    }

    /// Reconcile the on-screen components with `models`.
    ///
    /// Equal documents are a no-op. With the same component count each
    /// component is handled on its own: unchanged ones are skipped, ones
    /// whose items alone changed go through the diff path, and anything
    /// else is replaced. A different count replaces every component.
    pub fn reload_if_needed_models(
        &self,
        models: Vec<ComponentModel>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let weak: Weak<ControllerInner> = Arc::downgrade(&self.inner);
        self.dispatcher().main(move || match weak.upgrade() {
            Some(inner) => ControllerInner::reconcile(&inner, models, animation, completion),
            None => complete(completion),
        });
    }

    /// Decode `json` and reconcile against it.
    ///
    /// Decoding errors are returned and nothing is changed. A requested
    /// `size` is not compared, so a document that only resizes items is
    /// treated as unchanged.
    pub fn reload_if_needed_json(
        &self,
        json: &str,
        animation: Animation,
        completion: Option<Completion>,
    ) -> Result<()> {
        let models = decode_models(json)?;
        self.reload_if_needed_models(models, animation, completion);
        Ok(())
    }

    /// Remove the component at `index`, renumbering the survivors.
    pub fn remove_component(&self, index: usize) -> Option<Arc<Component>> {
        let removed = {
            let mut entries = self.inner.entries.write();
            if index >= entries.len() {
                return None;
            }
            let entry = entries.remove(index);
            for (index, entry) in entries.iter().enumerate() {
                entry.component.set_index(index);
            }
            entry
        };
        removed.detach();
        tracing::debug!(target: "horizon_stack::controller", index, "component removed");
        self.inner.signals.components_changed.emit(());
        self.inner.relayout();
        Some(removed.component)
    }

    /// Render the component tree for debugging.
    pub fn debug_tree(&self) -> String {
        ComponentTreeDebug::new().format(&self.components())
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("components", &self.component_count())
            .field("viewport", &self.viewport())
            .field("content_height", &self.content_height())
            .finish()
    }
}

impl ControllerInner {
    fn components(&self) -> Vec<Arc<Component>> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.component.clone())
            .collect()
    }

    /// Size each component is measured against.
    fn component_size(&self) -> Size {
        let viewport = self.layout.read().viewport;
        Size::new(
            viewport.width,
            (viewport.height - self.config.chrome_height()).max(0.0),
        )
    }

    /// Create a component for `model`, its adapter, and the layout hook.
    fn attach(inner: &Arc<Self>, model: ComponentModel, index: usize) -> ComponentEntry {
        let component = Component::new(model, inner.manager.clone(), inner.registry.clone());
        component.set_index(index);

        let interface = inner
            .interface_factory
            .as_ref()
            .map(|factory| factory(&component));
        if let Some(interface) = &interface {
            component.set_user_interface(interface);
        }

        let weak = Arc::downgrade(inner);
        let layout_connection = component.signals().layout_requested.connect(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.relayout();
            }
        });

        ComponentEntry {
            component,
            interface,
            layout_connection,
        }
    }

    /// Stack every component below the navigation bar.
    fn relayout(&self) {
        let _span = PerfSpan::new("controller.layout");
        let components = self.components();
        let viewport = self.layout.read().viewport;
        let top = self.config.navigation_bar_height;
        let bottom = top + self.component_size().height;

        let mut y = top;
        let last = components.len().saturating_sub(1);
        for (index, component) in components.iter().enumerate() {
            let mut height = component.height();
            let stretch = self.config.stretch_last_component || component.stretches_to_fill();
            if index == last && stretch {
                height = height.max(bottom - y);
            }
            component.set_frame(Rect::new(0.0, y, viewport.width, height));
            y += height;
        }

        let content_height = y - top;
        self.layout.write().content_height = content_height;
        tracing::trace!(
            target: "horizon_stack::controller",
            components = components.len(),
            content_height,
            "layout pass"
        );
        self.signals.layout_changed.emit(content_height);
    }

    fn reconcile(
        inner: &Arc<Self>,
        models: Vec<ComponentModel>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let current: Vec<ComponentModel> = inner
            .entries
            .read()
            .iter()
            .map(|entry| entry.component.model())
            .collect();
        if current == models {
            tracing::trace!(target: "horizon_stack::controller", "document unchanged");
            complete(completion);
            return;
        }

        if current.len() != models.len() {
            tracing::debug!(
                target: "horizon_stack::controller",
                from = current.len(),
                to = models.len(),
                "replacing all components"
            );
            Self::replace_all(inner, models);
            complete(completion);
            return;
        }

        let group = CompletionGroup::new(completion);
        let mut replaced = false;
        for (index, (model, old)) in models.into_iter().zip(current.iter()).enumerate() {
            match model.diff(old) {
                ComponentModelDiff::None => {}
                ComponentModelDiff::Items => {
                    let Some(component) = inner
                        .entries
                        .read()
                        .get(index)
                        .map(|entry| entry.component.clone())
                    else {
                        continue;
                    };
                    component.reload_with_diff(model.items, animation, Some(group.member()));
                }
                diff => {
                    tracing::debug!(
                        target: "horizon_stack::controller",
                        index,
                        ?diff,
                        "replacing component"
                    );
                    Self::replace_at(inner, index, model);
                    replaced = true;
                }
            }
        }
        if replaced {
            inner.signals.components_changed.emit(());
            inner.relayout();
        }
        group.release();
    }

    fn replace_at(inner: &Arc<Self>, index: usize, model: ComponentModel) {
        let entry = Self::attach(inner, model, index);
        entry.component.layout(inner.component_size());
        let old = {
            let mut entries = inner.entries.write();
            match entries.get_mut(index) {
                Some(slot) => Some(std::mem::replace(slot, entry)),
                None => None,
            }
        };
        if let Some(old) = old {
            old.detach();
        }
    }

    fn replace_all(inner: &Arc<Self>, models: Vec<ComponentModel>) {
        let size = inner.component_size();
        let entries: Vec<ComponentEntry> = models
            .into_iter()
            .enumerate()
            .map(|(index, model)| {
                let entry = Self::attach(inner, model, index);
                entry.component.layout(size);
                entry
            })
            .collect();
        let old = std::mem::replace(&mut *inner.entries.write(), entries);
        for entry in &old {
            entry.detach();
        }
        inner.signals.components_changed.emit(());
        inner.relayout();
    }
}

fn reload_in_sequence(mut pending: VecDeque<Arc<Component>>, completion: Option<Completion>) {
    let Some(component) = pending.pop_front() else {
        complete(completion);
        return;
    };
    component.reload(
        None,
        Animation::None,
        Some(Box::new(move || reload_in_sequence(pending, completion))),
    );
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Components(Vec<ComponentModel>),
    Wrapped { components: Vec<ComponentModel> },
}

fn decode_models(json: &str) -> Result<Vec<ComponentModel>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_array() && !value.is_object() {
        return Err(StackError::InvalidDocument(
            "expected an array of components or an object with `components`".to_string(),
        ));
    }
    let document: Document = serde_json::from_value(value)?;
    let mut models = match document {
        Document::Components(models) => models,
        Document::Wrapped { components } => components,
    };
    for model in &mut models {
        model.refresh_indexes();
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComponentKind;

    #[test]
    fn test_decode_array_and_wrapped() {
        let array = decode_models(r#"[{"kind": "list", "items": [{"title": "a"}, {"title": "b"}]}]"#)
            .unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0].items[1].index, 1);

        let wrapped = decode_models(r#"{"components": [{"kind": "grid", "span": 2}]}"#).unwrap();
        assert_eq!(wrapped[0].kind, ComponentKind::Grid);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(decode_models("[{"), Err(StackError::Json(_))));
        assert!(matches!(
            decode_models("42"),
            Err(StackError::InvalidDocument(_))
        ));
        assert!(Controller::from_json(r#"[{"kind": "table"}]"#).is_err());
    }

    #[test]
    fn test_remove_component_renumbers() {
        let controller = Controller::builder()
            .models((0..3).map(|i| ComponentModel::new(ComponentKind::List).with_identifier(format!("c{i}"))))
            .build()
            .unwrap();
        let removed = controller.remove_component(1).unwrap();
        assert_eq!(removed.identifier().as_deref(), Some("c1"));
        assert_eq!(controller.component_count(), 2);
        assert_eq!(controller.component_at(1).unwrap().index(), 1);
        assert_eq!(controller.component_at(1).unwrap().identifier().as_deref(), Some("c2"));
        assert!(controller.remove_component(5).is_none());
        assert_eq!(removed.signals().layout_requested.connection_count(), 0);
    }
}
