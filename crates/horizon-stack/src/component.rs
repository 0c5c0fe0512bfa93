//! Components: one declarative model rendered through one adapter.
//!
//! A [`Component`] owns its [`ComponentModel`] and derived layout state and
//! holds a weak reference to the [`UserInterface`] that renders it. Every
//! mutation goes through the component's [`ComponentManager`]; the
//! convenience methods here simply forward to it.
//!
//! # Signals
//!
//! | Signal | Arguments | Emitted |
//! |--------|-----------|---------|
//! | `updated` | `()` | after every settled mutation |
//! | `layout_requested` | `()` | when the hosting controller should relayout |
//! | `height_changed` | `f64` | after each height refresh |
//! | `phase_changed` | `MutationPhase` | on every mutation phase transition |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use horizon_stack_core::{Dispatcher, Signal};
use parking_lot::RwLock;

use crate::geometry::{Rect, Size};
use crate::interface::{Animation, Completion, UserInterface};
use crate::manager::{ComponentManager, OperationQueue};
use crate::model::{ComponentKind, ComponentModel, Item, ItemChanges};
use crate::view::ViewRegistry;

/// Where a mutation is in its lifecycle.
///
/// Phases only move forward: `Pending` → `ModelMutated` →
/// `AdapterNotified` → `HeightRefreshed` → `Settled`. Steps that do not
/// apply to an operation are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutationPhase {
    /// Accepted, waiting for the main context.
    Pending,
    /// The model reflects the mutation.
    ModelMutated,
    /// The adapter has been told and has acknowledged.
    AdapterNotified,
    /// Indices and height were recomputed.
    HeightRefreshed,
    /// Observers notified, completion fired.
    Settled,
}

/// Signals emitted by a component.
#[derive(Default)]
pub struct ComponentSignals {
    pub updated: Signal<()>,
    pub layout_requested: Signal<()>,
    pub height_changed: Signal<f64>,
    pub phase_changed: Signal<MutationPhase>,
}

impl std::fmt::Debug for ComponentSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSignals")
            .field("updated", &self.updated.connection_count())
            .field("layout_requested", &self.layout_requested.connection_count())
            .field("height_changed", &self.height_changed.connection_count())
            .field("phase_changed", &self.phase_changed.connection_count())
            .finish()
    }
}

#[derive(Debug, Default)]
struct ComponentState {
    frame: Rect,
    height: f64,
    stretch_to_fill: bool,
}

/// One renderable component.
pub struct Component {
    index: AtomicUsize,
    model: RwLock<ComponentModel>,
    state: RwLock<ComponentState>,
    interface: RwLock<Option<Weak<dyn UserInterface>>>,
    registry: Arc<ViewRegistry>,
    manager: ComponentManager,
    operations: OperationQueue,
    signals: ComponentSignals,
}

impl Component {
    /// Create a component for `model`.
    ///
    /// Item indices are renumbered so the model starts out dense.
    pub fn new(
        model: ComponentModel,
        manager: ComponentManager,
        registry: Arc<ViewRegistry>,
    ) -> Arc<Self> {
        let mut model = model;
        model.refresh_indexes();
        let operations = OperationQueue::new(manager.dispatcher().clone());
        Arc::new(Self {
            index: AtomicUsize::new(0),
            model: RwLock::new(model),
            state: RwLock::new(ComponentState::default()),
            interface: RwLock::new(None),
            registry,
            manager,
            operations,
            signals: ComponentSignals::default(),
        })
    }

    /// Position among the controller's components.
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.index.store(index, Ordering::Release);
    }

    /// The component's signals.
    pub fn signals(&self) -> &ComponentSignals {
        &self.signals
    }

    pub(crate) fn operations(&self) -> &OperationQueue {
        &self.operations
    }

    /// Mutations submitted to this component that have not settled yet.
    pub fn pending_operations(&self) -> usize {
        self.operations.len()
    }

    /// The engine that applies this component's mutations.
    pub fn manager(&self) -> &ComponentManager {
        &self.manager
    }

    /// The view registry used to measure items.
    pub fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    // =========================================================================
    // Model access
    // =========================================================================

    /// Snapshot of the whole model.
    pub fn model(&self) -> ComponentModel {
        self.model.read().clone()
    }

    /// The layout kind.
    pub fn kind(&self) -> ComponentKind {
        self.model.read().kind
    }

    /// The model identifier, if any.
    pub fn identifier(&self) -> Option<String> {
        self.model.read().identifier.clone()
    }

    /// The item at `at`.
    pub fn item(&self, at: usize) -> Option<Item> {
        self.model.read().items.get(at).cloned()
    }

    /// Snapshot of all items.
    pub fn items(&self) -> Vec<Item> {
        self.model.read().items.clone()
    }

    /// Number of items.
    pub fn item_count(&self) -> usize {
        self.model.read().items.len()
    }

    /// Returns `true` if the component has no items.
    pub fn is_empty(&self) -> bool {
        self.model.read().items.is_empty()
    }

    /// Returns `true` if this component's model equals `other`'s.
    pub fn model_equals(&self, other: &Component) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        *self.model.read() == *other.model.read()
    }

    /// Run `f` with the model locked for reading.
    pub(crate) fn with_model<R>(&self, f: impl FnOnce(&ComponentModel) -> R) -> R {
        f(&self.model.read())
    }

    /// Run `f` with the model locked for writing.
    pub(crate) fn with_model_mut<R>(&self, f: impl FnOnce(&mut ComponentModel) -> R) -> R {
        f(&mut self.model.write())
    }

    /// Replace the whole model, keeping layout state.
    pub(crate) fn replace_model(&self, model: ComponentModel) {
        let mut model = model;
        model.refresh_indexes();
        *self.model.write() = model;
    }

    /// Renumber every item to match its position.
    pub fn refresh_indexes(&self) {
        self.model.write().refresh_indexes();
    }

    // =========================================================================
    // Adapter
    // =========================================================================

    /// Attach the adapter that renders this component.
    ///
    /// Only a weak reference is kept; the host owns the adapter.
    pub fn set_user_interface(&self, interface: &Arc<dyn UserInterface>) {
        *self.interface.write() = Some(Arc::downgrade(interface));
    }

    /// The attached adapter, if it is still alive.
    pub fn user_interface(&self) -> Option<Arc<dyn UserInterface>> {
        self.interface.read().as_ref()?.upgrade()
    }

    // =========================================================================
    // Layout state
    // =========================================================================

    /// Current content width.
    pub fn width(&self) -> f64 {
        self.state.read().frame.size.width
    }

    /// Height from the last refresh.
    pub fn height(&self) -> f64 {
        self.state.read().height
    }

    /// Frame assigned by the hosting controller.
    pub fn frame(&self) -> Rect {
        self.state.read().frame
    }

    pub(crate) fn set_frame(&self, frame: Rect) {
        self.state.write().frame = frame;
    }

    /// Whether this component should stretch to fill the viewport.
    pub fn stretches_to_fill(&self) -> bool {
        self.state.read().stretch_to_fill
    }

    /// Ask the hosting controller to stretch this component to fill the
    /// remaining viewport.
    pub fn set_stretch_to_fill(&self, stretch: bool) {
        self.state.write().stretch_to_fill = stretch;
    }

    /// Width available to a single item.
    pub fn item_width(&self) -> f64 {
        let width = self.width();
        self.with_model(|model| {
            let available = width - model.layout.inset.horizontal();
            let width = match model.kind {
                ComponentKind::Grid | ComponentKind::Carousel if model.span > 0.0 => {
                    (available - model.layout.item_spacing * (model.span - 1.0)) / model.span
                }
                _ => available,
            };
            width.max(0.0)
        })
    }

    /// Measure the item at `at` and write its size back.
    ///
    /// With `uses_view_size` the measured size replaces the stored one.
    /// Otherwise only dimensions that are still zero are filled in.
    pub fn configure_item(&self, at: usize, uses_view_size: bool) {
        let Some(item) = self.item(at) else {
            return;
        };
        let container = Size::new(self.item_width(), 0.0);
        let fills_width = self.with_model(|model| {
            model.kind == ComponentKind::List || model.span > 0.0
        });

        let mut measured = match self.registry.make(&item.kind) {
            Some(view) => {
                view.configure(&item);
                view.compute_size(&item, container)
            }
            None => Size::new(container.width, item.size.height),
        };
        if fills_width {
            measured.width = container.width;
        }

        self.with_model_mut(|model| {
            let Some(stored) = model.items.get_mut(at) else {
                return;
            };
            if uses_view_size {
                stored.size = measured;
            } else {
                if stored.size.width <= 0.0 {
                    stored.size.width = measured.width;
                }
                if stored.size.height <= 0.0 {
                    stored.size.height = measured.height;
                }
            }
        });
    }

    /// Compute the content height from the current model.
    pub fn compute_height(&self) -> f64 {
        self.with_model(|model| {
            let layout = &model.layout;
            let heights = model.items.iter().map(|item| item.size.height);
            let content = match model.kind {
                ComponentKind::List => {
                    let rows = model.items.len();
                    heights.sum::<f64>() + gaps(rows) * layout.line_spacing
                }
                ComponentKind::Grid => {
                    let columns = (model.span.max(1.0)) as usize;
                    let rows: Vec<f64> = model
                        .items
                        .chunks(columns)
                        .map(|row| {
                            row.iter()
                                .map(|item| item.size.height)
                                .fold(0.0, f64::max)
                        })
                        .collect();
                    rows.iter().sum::<f64>() + gaps(rows.len()) * layout.line_spacing
                }
                ComponentKind::Carousel => heights.fold(0.0, f64::max),
            };
            let header = model.header.as_ref().map_or(0.0, |item| item.size.height);
            let footer = model.footer.as_ref().map_or(0.0, |item| item.size.height);
            layout.inset.vertical() + header + content + footer
        })
    }

    /// Recompute and store the height, notifying observers.
    pub fn refresh_height(&self) -> f64 {
        let height = self.compute_height();
        self.state.write().height = height;
        tracing::trace!(
            target: "horizon_stack::component",
            component = self.index(),
            height,
            "height refreshed"
        );
        self.signals.height_changed.emit(height);
        height
    }

    /// Renumber items on the background context, then recompute the height
    /// on the main context and call `completion` there.
    pub fn update_height_and_indexes(self: &Arc<Self>, dispatcher: &Dispatcher, completion: Completion) {
        let weak = Arc::downgrade(self);
        dispatcher.background_then_main(
            move || {
                if let Some(component) = weak.upgrade() {
                    component.refresh_indexes();
                }
                weak
            },
            move |weak| {
                if let Some(component) = weak.upgrade() {
                    component.refresh_height();
                }
                completion();
            },
        );
    }

    /// Adopt a new size, re-measure every item and recompute the height.
    pub fn layout(&self, size: Size) {
        {
            let mut state = self.state.write();
            state.frame.size.width = size.width;
        }
        let count = self.item_count();
        for index in 0..count {
            self.configure_item(index, true);
        }
        self.with_model_mut(|model| {
            if let Some(header) = model.header.as_mut()
                && header.size.width <= 0.0
            {
                header.size.width = size.width;
            }
            if let Some(footer) = model.footer.as_mut()
                && footer.size.width <= 0.0
            {
                footer.size.width = size.width;
            }
        });
        self.refresh_height();
    }

    /// Notify observers that a mutation settled.
    pub fn after_update(&self) {
        self.signals.updated.emit(());
    }

    /// Ask the hosting controller for a relayout.
    pub fn request_layout(&self) {
        self.signals.layout_requested.emit(());
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append one item.
    pub fn append(self: &Arc<Self>, item: Item, animation: Animation, completion: Option<Completion>) {
        self.manager.append(self, item, animation, completion);
    }

    /// Append several items.
    pub fn append_items(
        self: &Arc<Self>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.append_items(self, items, animation, completion);
    }

    /// Prepend several items.
    pub fn prepend_items(
        self: &Arc<Self>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.prepend_items(self, items, animation, completion);
    }

    /// Insert one item at `at`.
    pub fn insert(
        self: &Arc<Self>,
        item: Item,
        at: usize,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.insert(self, item, at, animation, completion);
    }

    /// Replace the item at `at`.
    pub fn update(
        self: &Arc<Self>,
        item: Item,
        at: usize,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.update(self, item, at, animation, completion);
    }

    /// Delete the first item equal to `item`.
    pub fn delete_item(
        self: &Arc<Self>,
        item: Item,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.delete_item(self, item, animation, completion);
    }

    /// Delete every item equal to one of `items`.
    pub fn delete_items(
        self: &Arc<Self>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.delete_items(self, items, animation, completion);
    }

    /// Delete the item at `at`.
    pub fn delete(self: &Arc<Self>, at: usize, animation: Animation, completion: Option<Completion>) {
        self.manager.delete(self, at, animation, completion);
    }

    /// Delete the items at `indexes`.
    pub fn delete_indexes(
        self: &Arc<Self>,
        indexes: Vec<usize>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.delete_indexes(self, indexes, animation, completion);
    }

    /// Re-measure and reload `indexes`, or everything when `None`.
    pub fn reload(
        self: &Arc<Self>,
        indexes: Option<Vec<usize>>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.reload(self, indexes, animation, completion);
    }

    /// Replace the items if they differ from the current ones.
    pub fn reload_if_needed(
        self: &Arc<Self>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.reload_if_needed(self, items, animation, completion);
    }

    /// Apply a precomputed change set.
    pub fn reload_if_needed_with_changes(
        self: &Arc<Self>,
        changes: ItemChanges,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager
            .reload_if_needed_with_changes(self, changes, items, animation, completion);
    }

    /// Diff `items` against the current ones and apply the change set.
    pub fn reload_with_diff(
        self: &Arc<Self>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.manager.reload_with_diff(self, items, animation, completion);
    }
}

fn gaps(count: usize) -> f64 {
    count.saturating_sub(1) as f64
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let model = self.model.read();
        f.debug_struct("Component")
            .field("index", &self.index())
            .field("identifier", &model.identifier)
            .field("kind", &model.kind)
            .field("items", &model.items.len())
            .field("height", &self.state.read().height)
            .finish()
    }
}
