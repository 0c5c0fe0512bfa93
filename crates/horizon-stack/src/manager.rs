//! The component mutation engine.
//!
//! [`ComponentManager`] turns data mutations into model changes plus the
//! smallest adapter call that brings the rendered view in line. Every
//! operation follows the same protocol:
//!
//! 1. Emit [`MutationPhase::Pending`] and hop to the main context. The
//!    caller is never blocked.
//! 2. Mutate the model ([`MutationPhase::ModelMutated`]).
//! 3. Tell the adapter. A component that was empty before an addition gets
//!    a full `reload_data_source`; otherwise the minimal incremental call is
//!    made ([`MutationPhase::AdapterNotified`]).
//! 4. When the adapter reports back, optionally renumber and recompute the
//!    height ([`MutationPhase::HeightRefreshed`]), then notify observers,
//!    request a layout and fire the completion ([`MutationPhase::Settled`]).
//!
//! Operations on one component run strictly one after another: the next one
//! starts only after the previous one has settled, so a diff computed on the
//! background context is always applied to the model it was computed from.
//!
//! Operations hold only weak references to their component across hops. If
//! the component is released in between, the operation does nothing except
//! fire its completion. Out-of-range indices behave the same way. Every
//! operation fires its completion exactly once, always on the main context.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use horizon_stack_core::{Dispatcher, PerfSpan};
use parking_lot::Mutex;

use crate::component::{Component, MutationPhase};
use crate::interface::{Animation, Completion, UpdateTransaction, complete};
use crate::model::{Item, ItemChanges};

/// Marker kind for items that host nested components.
pub const DEFAULT_COMPOSITE_KIND: &str = "composite";

/// Reconciles the nested components of a composite item.
///
/// The engine hands off composite updates to this collaborator and waits
/// for `completion` before settling. Mutations the reconciler submits to
/// the same component are queued behind the running update, so
/// `completion` must not wait for them.
pub trait CompositeReconciler: Send + Sync {
    /// Bring the children rendered at `index` in line with `item`.
    fn reconcile(
        &self,
        component: &Arc<Component>,
        index: usize,
        item: &Item,
        animation: Animation,
        completion: Completion,
    );
}

type UpdateDone = Box<dyn FnOnce(bool) + Send + 'static>;

type Operation = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct OperationState {
    running: bool,
    waiting: VecDeque<Operation>,
}

/// Per-component FIFO of submitted operations.
///
/// At most one operation is between its start and its settle at any time.
/// Operations are started by posting them to the main queue, never inline.
pub(crate) struct OperationQueue {
    dispatcher: Dispatcher,
    state: Mutex<OperationState>,
}

impl OperationQueue {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            state: Mutex::new(OperationState::default()),
        }
    }

    fn submit(&self, operation: Operation) {
        let mut state = self.state.lock();
        if state.running {
            state.waiting.push_back(operation);
        } else {
            state.running = true;
            drop(state);
            self.dispatcher.main(operation);
        }
    }

    /// Start the next waiting operation, or go idle.
    fn advance(&self) {
        let mut state = self.state.lock();
        match state.waiting.pop_front() {
            Some(next) => {
                drop(state);
                self.dispatcher.main(next);
            }
            None => state.running = false,
        }
    }

    /// Operations submitted and not yet settled.
    pub(crate) fn len(&self) -> usize {
        let state = self.state.lock();
        state.waiting.len() + usize::from(state.running)
    }
}

impl Drop for OperationQueue {
    // Waiting operations find their component gone and only complete.
    fn drop(&mut self) {
        for operation in self.state.get_mut().waiting.drain(..) {
            self.dispatcher.main(operation);
        }
    }
}

/// Applies mutations to components.
///
/// Cheap to clone; clones share the dispatcher and reconciler.
#[derive(Clone)]
pub struct ComponentManager {
    dispatcher: Dispatcher,
    reconciler: Option<Arc<dyn CompositeReconciler>>,
    composite_kind: Arc<str>,
}

impl ComponentManager {
    /// Create a manager that schedules work on `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            reconciler: None,
            composite_kind: Arc::from(DEFAULT_COMPOSITE_KIND),
        }
    }

    /// Route composite updates to `reconciler`.
    pub fn with_reconciler(mut self, reconciler: Arc<dyn CompositeReconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Use `kind` as the composite marker instead of `"composite"`.
    pub fn with_composite_kind(mut self, kind: impl Into<String>) -> Self {
        self.composite_kind = Arc::from(kind.into());
        self
    }

    /// The dispatcher this manager schedules on.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The composite marker kind.
    pub fn composite_kind(&self) -> &str {
        &self.composite_kind
    }

    // =========================================================================
    // Additions
    // =========================================================================

    /// Append one item.
    pub fn append(
        &self,
        component: &Arc<Component>,
        item: Item,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.append_items(component, vec![item], animation, completion);
    }

    /// Append `items` at the end.
    ///
    /// The adapter receives the new indices `[old_count, old_count + n)`.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index(), count = items.len())
    )]
    pub fn append_items(
        &self,
        component: &Arc<Component>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            if items.is_empty() {
                complete(completion);
                return;
            }
            let start = component.with_model_mut(|model| {
                let start = model.items.len();
                model.items.extend(items);
                for (offset, item) in model.items[start..].iter_mut().enumerate() {
                    item.index = start + offset;
                }
                start
            });
            let end = component.item_count();
            for index in start..end {
                component.configure_item(index, false);
            }
            manager.emit_phase(&component, MutationPhase::ModelMutated);

            let indexes: Vec<usize> = (start..end).collect();
            manager.notify_addition(&component, start == 0, &indexes, animation, completion);
        });
    }

    /// Prepend `items` at the start.
    ///
    /// When the component already had items the adapter receives
    /// `[n - 1, ..., 0]`; otherwise it reloads fully.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index(), count = items.len())
    )]
    pub fn prepend_items(
        &self,
        component: &Arc<Component>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            if items.is_empty() {
                complete(completion);
                return;
            }
            let count = items.len();
            let was_empty = component.with_model_mut(|model| {
                let was_empty = model.items.is_empty();
                model.items.splice(0..0, items);
                model.refresh_indexes();
                was_empty
            });
            for index in 0..count {
                component.configure_item(index, false);
            }
            manager.emit_phase(&component, MutationPhase::ModelMutated);

            let indexes: Vec<usize> = (0..count).rev().collect();
            manager.notify_addition(&component, was_empty, &indexes, animation, completion);
        });
    }

    /// Insert `item` at `at`.
    ///
    /// `at` may equal the item count (insert at end). Anything beyond is a
    /// no-op.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index(), at = at)
    )]
    pub fn insert(
        &self,
        component: &Arc<Component>,
        item: Item,
        at: usize,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            let inserted = component.with_model_mut(|model| {
                if at > model.items.len() {
                    return None;
                }
                let was_empty = model.items.is_empty();
                model.items.insert(at, item);
                model.refresh_indexes();
                Some(was_empty)
            });
            let Some(was_empty) = inserted else {
                tracing::debug!(target: "horizon_stack::manager", at, "insert out of range");
                complete(completion);
                return;
            };
            component.configure_item(at, false);
            manager.emit_phase(&component, MutationPhase::ModelMutated);
            manager.notify_addition(&component, was_empty, &[at], animation, completion);
        });
    }

    fn notify_addition(
        &self,
        component: &Arc<Component>,
        was_empty: bool,
        indexes: &[usize],
        animation: Animation,
        completion: Option<Completion>,
    ) {
        horizon_stack_core::debug_assert_main_queue!();
        match component.user_interface() {
            Some(interface) if was_empty => {
                interface.reload_data_source();
                self.emit_phase(component, MutationPhase::AdapterNotified);
                self.finish(component, true, completion);
            }
            Some(interface) => {
                let done = self.after_adapter(component, true, completion);
                interface.insert(indexes, animation, done);
            }
            None => self.finish(component, true, completion),
        }
    }

    // =========================================================================
    // Removals
    // =========================================================================

    /// Delete the first item equal to `item`.
    pub fn delete_item(
        &self,
        component: &Arc<Component>,
        item: Item,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.delete_items(component, vec![item], animation, completion);
    }

    /// Delete, for each of `items`, the first equal item not already chosen.
    pub fn delete_items(
        &self,
        component: &Arc<Component>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            let indexes = component.with_model(|model| {
                let mut chosen: Vec<usize> = Vec::with_capacity(items.len());
                for wanted in &items {
                    let found = model
                        .items
                        .iter()
                        .enumerate()
                        .find(|(index, item)| *item == wanted && !chosen.contains(index));
                    if let Some((index, _)) = found {
                        chosen.push(index);
                    }
                }
                chosen
            });
            manager.apply_deletion(&component, indexes, animation, completion);
        });
    }

    /// Delete the item at `at`.
    pub fn delete(
        &self,
        component: &Arc<Component>,
        at: usize,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        self.delete_indexes(component, vec![at], animation, completion);
    }

    /// Delete the items at `indexes`.
    ///
    /// Invalid indices are ignored. The adapter is told the original
    /// positions, in ascending order.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index(), count = indexes.len())
    )]
    pub fn delete_indexes(
        &self,
        component: &Arc<Component>,
        indexes: Vec<usize>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            manager.apply_deletion(&component, indexes, animation, completion);
        });
    }

    fn apply_deletion(
        &self,
        component: &Arc<Component>,
        indexes: Vec<usize>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let removed = component.with_model_mut(|model| {
            let mut valid: Vec<usize> = indexes
                .into_iter()
                .filter(|index| *index < model.items.len())
                .collect();
            valid.sort_unstable();
            valid.dedup();
            for index in valid.iter().rev() {
                model.items.remove(*index);
            }
            model.refresh_indexes();
            valid
        });

        if removed.is_empty() {
            tracing::debug!(target: "horizon_stack::manager", "nothing to delete");
            complete(completion);
            return;
        }
        self.emit_phase(component, MutationPhase::ModelMutated);

        horizon_stack_core::debug_assert_main_queue!();
        match component.user_interface() {
            Some(interface) => {
                let done = self.after_adapter(component, true, completion);
                interface.delete(&removed, animation, done);
            }
            None => self.finish(component, true, completion),
        }
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Replace the item at `at`.
    ///
    /// Composite items are handed to the [`CompositeReconciler`]. A change
    /// of kind or height reconfigures the live cell inside an update
    /// transaction (or reloads the row) and refreshes the height. Any other
    /// change only reconfigures the live cell.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index(), at = at)
    )]
    pub fn update(
        &self,
        component: &Arc<Component>,
        item: Item,
        at: usize,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            if at >= component.item_count() {
                tracing::debug!(target: "horizon_stack::manager", at, "update out of range");
                complete(completion);
                return;
            }
            let finisher = manager.clone();
            let weak = Arc::downgrade(&component);
            manager.apply_update(
                &component,
                item,
                at,
                animation,
                Box::new(move |refresh| match weak.upgrade() {
                    Some(component) => finisher.finish(&component, refresh, completion),
                    None => complete(completion),
                }),
            );
        });
    }

    /// Replace one item and tell the adapter, then call `done` with whether
    /// the height needs refreshing. Must run on the main context.
    fn apply_update(
        &self,
        component: &Arc<Component>,
        item: Item,
        at: usize,
        animation: Animation,
        done: UpdateDone,
    ) {
        horizon_stack_core::debug_assert_main_queue!();
        let replaced = component.with_model_mut(|model| {
            let slot = model.items.get_mut(at)?;
            let mut item = item;
            item.index = at;
            Some(std::mem::replace(slot, item))
        });
        let Some(old) = replaced else {
            done(false);
            return;
        };
        let interface = component.user_interface();

        let Some(new) = component.item(at) else {
            done(false);
            return;
        };
        if new.kind == *self.composite_kind {
            self.emit_phase(component, MutationPhase::ModelMutated);
            if let Some(reconciler) = &self.reconciler {
                reconciler.reconcile(component, at, &new, animation, Box::new(move || done(false)));
                return;
            }
            if let Some(view) = interface.as_ref().and_then(|ui| ui.view_at(at)) {
                view.configure(&new);
            }
            done(false);
            return;
        }

        component.configure_item(at, false);
        self.emit_phase(component, MutationPhase::ModelMutated);
        let Some(new) = component.item(at) else {
            done(false);
            return;
        };
        let reshaped = new.kind != old.kind || new.size.height != old.size.height;
        tracing::trace!(
            target: "horizon_stack::manager",
            at,
            reshaped,
            old_height = old.size.height,
            new_height = new.size.height,
            "item updated"
        );

        let Some(interface) = interface else {
            done(reshaped);
            return;
        };
        let cell = interface.view_at(at);

        if !reshaped {
            if let Some(cell) = cell {
                cell.configure(&new);
                self.emit_phase(component, MutationPhase::AdapterNotified);
            }
            done(false);
            return;
        }

        match cell {
            Some(cell) if animation.is_animated() => {
                {
                    let _transaction = UpdateTransaction::begin(&*interface);
                    cell.configure(&new);
                }
                self.emit_phase(component, MutationPhase::AdapterNotified);
                done(true);
            }
            _ => {
                let manager = self.clone();
                let weak = Arc::downgrade(component);
                interface.reload(
                    &[at],
                    animation,
                    Box::new(move || {
                        if let Some(component) = weak.upgrade() {
                            manager.emit_phase(&component, MutationPhase::AdapterNotified);
                        }
                        done(true);
                    }),
                );
            }
        }
    }

    // =========================================================================
    // Reloads
    // =========================================================================

    /// Re-measure and reload `indexes`, or the whole component when `None`.
    ///
    /// Indices are renumbered on the background context first. With
    /// [`Animation::None`] the adapter resets its data source instead.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index())
    )]
    pub fn reload(
        &self,
        component: &Arc<Component>,
        indexes: Option<Vec<usize>>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            let weak = Arc::downgrade(&component);
            let continuation = manager.clone();
            manager.dispatcher.background_then_main(
                move || {
                    if let Some(component) = weak.upgrade() {
                        component.refresh_indexes();
                    }
                    weak
                },
                move |weak| {
                    let Some(component) = weak.upgrade() else {
                        complete(completion);
                        return;
                    };
                    continuation.reload_now(&component, indexes, animation, completion);
                },
            );
        });
    }

    fn reload_now(
        &self,
        component: &Arc<Component>,
        indexes: Option<Vec<usize>>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        horizon_stack_core::debug_assert_main_queue!();
        let count = component.item_count();
        let targets: Vec<usize> = match &indexes {
            Some(indexes) => indexes.iter().copied().filter(|index| *index < count).collect(),
            None => (0..count).collect(),
        };
        for index in &targets {
            component.configure_item(*index, true);
        }
        self.emit_phase(component, MutationPhase::ModelMutated);

        let Some(interface) = component.user_interface() else {
            self.finish(component, true, completion);
            return;
        };
        if !animation.is_animated() {
            interface.reload_data_source();
            self.emit_phase(component, MutationPhase::AdapterNotified);
            self.finish(component, true, completion);
            return;
        }
        let done = self.after_adapter(component, true, completion);
        match indexes {
            Some(_) => interface.reload(&targets, animation, done),
            None => interface.reload_section(0, animation, done),
        }
    }

    /// Replace the items only if they differ from the current ones.
    ///
    /// Equality is checked on the background context. With an unchanged
    /// item count, unchanged items keep their measured sizes and only the
    /// changed positions are reloaded. A different count reloads everything.
    ///
    /// Item equality ignores `size`, so items that differ only in their
    /// requested size count as unchanged and keep the size already
    /// measured. Use [`update`](Self::update) to resize an item.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index(), count = items.len())
    )]
    pub fn reload_if_needed(
        &self,
        component: &Arc<Component>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            let current = component.items();
            let weak = Arc::downgrade(&component);
            let continuation = manager.clone();
            manager.dispatcher.background_then_main(
                move || {
                    let _span = PerfSpan::new("reload_if_needed.compare");
                    let changed = changed_positions(&current, &items);
                    (current.len(), changed, items)
                },
                move |(compared_len, changed, items)| {
                    let Some(component) = weak.upgrade() else {
                        complete(completion);
                        return;
                    };
                    let Some(changed) = changed else {
                        tracing::trace!(target: "horizon_stack::manager", "items unchanged");
                        complete(completion);
                        return;
                    };
                    continuation.replace_items(
                        &component,
                        compared_len,
                        changed,
                        items,
                        animation,
                        completion,
                    );
                },
            );
        });
    }

    fn replace_items(
        &self,
        component: &Arc<Component>,
        compared_len: usize,
        changed: Vec<usize>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        horizon_stack_core::debug_assert_main_queue!();
        let same_length = items.len() == compared_len;
        let partial = component.with_model_mut(|model| {
            let partial = same_length && model.items.len() == compared_len;
            let mut items = items;
            if partial {
                for (index, item) in items.iter_mut().enumerate() {
                    if !changed.contains(&index) {
                        item.size = model.items[index].size;
                    }
                }
            }
            model.items = items;
            model.refresh_indexes();
            partial
        });

        let targets: Vec<usize> = if partial {
            changed
        } else {
            (0..component.item_count()).collect()
        };
        for index in &targets {
            component.configure_item(*index, false);
        }
        self.emit_phase(component, MutationPhase::ModelMutated);

        let Some(interface) = component.user_interface() else {
            self.finish(component, true, completion);
            return;
        };
        if partial {
            let done = self.after_adapter(component, true, completion);
            interface.reload(&targets, animation, done);
        } else {
            interface.reload_data_source();
            self.emit_phase(component, MutationPhase::AdapterNotified);
            self.finish(component, true, completion);
        }
    }

    /// Apply a precomputed change set.
    ///
    /// The adapter's `process` runs first with a data-source update that
    /// installs `items` but keeps the old item wherever a plain or child
    /// update is pending. The height is refreshed when the structure
    /// changed. Plain updates are then applied in index order, followed by
    /// child updates, and the operation settles once at the end.
    pub fn reload_if_needed_with_changes(
        &self,
        component: &Arc<Component>,
        changes: ItemChanges,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            manager.apply_changes(&component, changes, items, animation, completion);
        });
    }

    /// Diff `items` against the current ones on the background context and
    /// apply the result as a change set. Equal collections are a no-op.
    #[tracing::instrument(
        target = "horizon_stack::manager",
        level = "trace",
        skip_all,
        fields(component = component.index(), count = items.len())
    )]
    pub fn reload_with_diff(
        &self,
        component: &Arc<Component>,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        let manager = self.clone();
        self.schedule(component, completion, move |component, completion| {
            let current = component.items();
            let weak = Arc::downgrade(&component);
            let continuation = manager.clone();
            manager.dispatcher.background_then_main(
                move || {
                    let _span = PerfSpan::new("reload_with_diff.diff");
                    (ItemChanges::between(&current, &items), items)
                },
                move |(changes, items)| {
                    let Some(component) = weak.upgrade() else {
                        complete(completion);
                        return;
                    };
                    match changes {
                        Some(changes) => continuation.apply_changes(
                            &component,
                            changes,
                            items,
                            animation,
                            completion,
                        ),
                        None => complete(completion),
                    }
                },
            );
        });
    }

    fn apply_changes(
        &self,
        component: &Arc<Component>,
        changes: ItemChanges,
        items: Vec<Item>,
        animation: Animation,
        completion: Option<Completion>,
    ) {
        horizon_stack_core::debug_assert_main_queue!();
        tracing::trace!(
            target: "horizon_stack::manager",
            component = component.index(),
            insertions = changes.insertions.len(),
            deletions = changes.deletions.len(),
            reloads = changes.reloads.len(),
            updates = changes.updates.len(),
            child_updates = changes.child_updates.len(),
            "applying change set"
        );

        let old_items = component.items();
        let mut remeasure = Vec::new();
        let staged: Vec<Item> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let deferred =
                    changes.updates.contains(&index) || changes.child_updates.contains(&index);
                match old_items.get(index) {
                    Some(old) if deferred => old.clone(),
                    Some(old) if old == item => {
                        let mut item = item.clone();
                        item.size = old.size;
                        item
                    }
                    _ => {
                        remeasure.push(index);
                        item.clone()
                    }
                }
            })
            .collect();

        let mut pending: VecDeque<(usize, Item)> = VecDeque::new();
        for index in changes.updates.iter().chain(changes.child_updates.iter()) {
            if let Some(item) = items.get(*index) {
                pending.push_back((*index, item.clone()));
            }
        }

        let stage_weak = Arc::downgrade(component);
        let stage_manager = self.clone();
        let update_data_source: Completion = Box::new(move || {
            let Some(component) = stage_weak.upgrade() else {
                return;
            };
            component.with_model_mut(|model| {
                model.items = staged;
                model.refresh_indexes();
            });
            for index in remeasure {
                component.configure_item(index, false);
            }
            stage_manager.emit_phase(&component, MutationPhase::ModelMutated);
        });

        let structural = changes.has_structural_changes();
        let manager = self.clone();
        let weak = Arc::downgrade(component);
        let after_process: Completion = Box::new(move || {
            let Some(component) = weak.upgrade() else {
                complete(completion);
                return;
            };
            manager.emit_phase(&component, MutationPhase::AdapterNotified);
            if structural {
                let chain = manager.clone();
                let weak = Arc::downgrade(&component);
                component.update_height_and_indexes(
                    &manager.dispatcher,
                    Box::new(move || match weak.upgrade() {
                        Some(component) => {
                            chain.emit_phase(&component, MutationPhase::HeightRefreshed);
                            chain.run_update_chain(component, pending, animation, false, completion);
                        }
                        None => complete(completion),
                    }),
                );
            } else {
                manager.run_update_chain(component, pending, animation, false, completion);
            }
        });

        match component.user_interface() {
            Some(interface) => interface.process(&changes, animation, update_data_source, after_process),
            None => {
                update_data_source();
                after_process();
            }
        }
    }

    /// Apply queued updates one after another, then settle once.
    fn run_update_chain(
        &self,
        component: Arc<Component>,
        mut pending: VecDeque<(usize, Item)>,
        animation: Animation,
        refresh: bool,
        completion: Option<Completion>,
    ) {
        let Some((index, item)) = pending.pop_front() else {
            self.finish(&component, refresh, completion);
            return;
        };
        let manager = self.clone();
        let weak: Weak<Component> = Arc::downgrade(&component);
        self.apply_update(
            &component,
            item,
            index,
            animation,
            Box::new(move |needs_refresh| match weak.upgrade() {
                Some(component) => manager.run_update_chain(
                    component,
                    pending,
                    animation,
                    refresh || needs_refresh,
                    completion,
                ),
                None => complete(completion),
            }),
        );
    }

    // =========================================================================
    // Protocol plumbing
    // =========================================================================

    /// Emit `Pending` and queue `op` behind the component's running
    /// operation. `op` runs on the main context if the component is still
    /// alive, and its completion starts the next queued operation.
    fn schedule<F>(&self, component: &Arc<Component>, completion: Option<Completion>, op: F)
    where
        F: FnOnce(Arc<Component>, Option<Completion>) + Send + 'static,
    {
        self.emit_phase(component, MutationPhase::Pending);
        let weak = Arc::downgrade(component);
        let start: Operation = Box::new(move || match weak.upgrade() {
            Some(component) => {
                let next = Arc::downgrade(&component);
                let settled: Completion = Box::new(move || {
                    if let Some(component) = next.upgrade() {
                        component.operations().advance();
                    }
                    complete(completion);
                });
                op(component, Some(settled));
            }
            None => {
                tracing::debug!(target: "horizon_stack::manager", "component released before mutation");
                complete(completion);
            }
        });
        component.operations().submit(start);
    }

    /// Build the adapter completion that finishes the operation.
    fn after_adapter(
        &self,
        component: &Arc<Component>,
        update_height: bool,
        completion: Option<Completion>,
    ) -> Completion {
        let manager = self.clone();
        let weak = Arc::downgrade(component);
        Box::new(move || match weak.upgrade() {
            Some(component) => {
                manager.emit_phase(&component, MutationPhase::AdapterNotified);
                manager.finish(&component, update_height, completion);
            }
            None => complete(completion),
        })
    }

    /// Optionally refresh indices and height, then settle.
    fn finish(&self, component: &Arc<Component>, update_height: bool, completion: Option<Completion>) {
        if !update_height {
            self.settle(component, completion);
            return;
        }
        let manager = self.clone();
        let weak = Arc::downgrade(component);
        component.update_height_and_indexes(
            &self.dispatcher,
            Box::new(move || match weak.upgrade() {
                Some(component) => {
                    manager.emit_phase(&component, MutationPhase::HeightRefreshed);
                    manager.settle(&component, completion);
                }
                None => complete(completion),
            }),
        );
    }

    fn settle(&self, component: &Component, completion: Option<Completion>) {
        component.after_update();
        component.request_layout();
        self.emit_phase(component, MutationPhase::Settled);
        complete(completion);
    }

    fn emit_phase(&self, component: &Component, phase: MutationPhase) {
        tracing::trace!(
            target: "horizon_stack::manager",
            component = component.index(),
            ?phase,
            "mutation phase"
        );
        component.signals().phase_changed.emit(phase);
    }
}

impl std::fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentManager")
            .field("composite_kind", &self.composite_kind)
            .field("has_reconciler", &self.reconciler.is_some())
            .finish()
    }
}

/// Positions whose content differs, or `None` when both collections are
/// equal. Positions past the shorter collection count as changed.
fn changed_positions(old: &[Item], new: &[Item]) -> Option<Vec<usize>> {
    if old == new {
        return None;
    }
    let len = old.len().max(new.len());
    Some(
        (0..len)
            .filter(|index| old.get(*index) != new.get(*index))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::interface::{HeadlessInterface, InterfaceCall, UserInterface};
    use crate::model::{ComponentKind, ComponentModel};
    use crate::view::{FixedSizeView, ViewRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        dispatcher: Dispatcher,
        component: Arc<Component>,
        interface: Arc<HeadlessInterface>,
    }

    fn fixture(titles: &[&str]) -> Fixture {
        let dispatcher = Dispatcher::new().unwrap();
        let mut registry = ViewRegistry::new();
        registry.register_default(|| FixedSizeView::with_height(44.0));
        let items = titles.iter().map(|title| Item::new(*title)).collect();
        let component = Component::new(
            ComponentModel::new(ComponentKind::List).with_items(items),
            ComponentManager::new(dispatcher.clone()),
            Arc::new(registry),
        );
        component.layout(Size::new(320.0, 0.0));
        let interface = Arc::new(HeadlessInterface::new());
        let erased: Arc<dyn UserInterface> = interface.clone();
        component.set_user_interface(&erased);
        Fixture {
            dispatcher,
            component,
            interface,
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Option<Completion>) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = count.clone();
        (
            count,
            Some(Box::new(move || {
                clone.fetch_add(1, Ordering::SeqCst);
            })),
        )
    }

    #[test]
    fn test_changed_positions() {
        let a = vec![Item::new("a"), Item::new("b")];
        let b = vec![Item::new("a"), Item::new("x"), Item::new("c")];
        assert_eq!(changed_positions(&a, &a.clone()), None);
        assert_eq!(changed_positions(&a, &b), Some(vec![1, 2]));
    }

    #[test]
    fn test_operation_is_deferred_to_main_queue() {
        let f = fixture(&["a"]);
        let (done, completion) = counter();
        f.component.append(Item::new("b"), Animation::Automatic, completion);

        assert_eq!(f.component.item_count(), 1);
        assert_eq!(done.load(Ordering::SeqCst), 0);

        f.dispatcher.run_until_idle();
        assert_eq!(f.component.item_count(), 2);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.interface.calls(),
            vec![InterfaceCall::Insert(vec![1], Animation::Automatic)]
        );
    }

    #[test]
    fn test_append_to_empty_reloads_data_source() {
        let f = fixture(&[]);
        f.component
            .append_items(vec![Item::new("a"), Item::new("b")], Animation::Fade, None);
        f.dispatcher.run_until_idle();
        assert_eq!(f.interface.calls(), vec![InterfaceCall::ReloadDataSource]);
        assert_eq!(f.component.height(), 88.0);
    }

    #[test]
    fn test_insert_out_of_range_is_noop() {
        let f = fixture(&["a", "b"]);
        let (done, completion) = counter();
        f.component
            .insert(Item::new("z"), 3, Animation::Automatic, completion);
        f.dispatcher.run_until_idle();
        assert_eq!(f.component.item_count(), 2);
        assert!(f.interface.calls().is_empty());
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_insert_at_end() {
        let f = fixture(&["a", "b"]);
        f.component
            .insert(Item::new("c"), 2, Animation::Automatic, None);
        f.dispatcher.run_until_idle();
        assert_eq!(f.component.item(2).unwrap().title, "c");
        assert_eq!(
            f.interface.calls(),
            vec![InterfaceCall::Insert(vec![2], Animation::Automatic)]
        );
    }

    #[test]
    fn test_delete_item_by_value() {
        let f = fixture(&["a", "b", "c"]);
        f.component
            .delete_item(Item::new("b"), Animation::Automatic, None);
        f.dispatcher.run_until_idle();
        let titles: Vec<String> = f.component.items().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["a", "c"]);
        assert_eq!(
            f.interface.calls(),
            vec![InterfaceCall::Delete(vec![1], Animation::Automatic)]
        );
    }

    #[test]
    fn test_phases_in_order() {
        let f = fixture(&["a"]);
        let phases = Arc::new(Mutex::new(Vec::new()));
        let phases_clone = phases.clone();
        f.component
            .signals()
            .phase_changed
            .connect(move |phase| phases_clone.lock().push(*phase));

        f.component
            .append(Item::new("b"), Animation::Automatic, None);
        f.dispatcher.run_until_idle();

        assert_eq!(
            *phases.lock(),
            vec![
                MutationPhase::Pending,
                MutationPhase::ModelMutated,
                MutationPhase::AdapterNotified,
                MutationPhase::HeightRefreshed,
                MutationPhase::Settled,
            ]
        );
    }

    #[test]
    fn test_composite_update_goes_to_reconciler() {
        struct Recorder(Mutex<Vec<usize>>);
        impl CompositeReconciler for Recorder {
            fn reconcile(
                &self,
                _component: &Arc<Component>,
                index: usize,
                _item: &Item,
                _animation: Animation,
                completion: Completion,
            ) {
                self.0.lock().push(index);
                completion();
            }
        }

        let dispatcher = Dispatcher::new().unwrap();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let manager = ComponentManager::new(dispatcher.clone()).with_reconciler(recorder.clone());
        let component = Component::new(
            ComponentModel::new(ComponentKind::List)
                .with_items(vec![Item::new("a"), Item::new("b")]),
            manager,
            Arc::new(ViewRegistry::new()),
        );
        let heights = Arc::new(AtomicUsize::new(0));
        let heights_clone = heights.clone();
        component.signals().height_changed.connect(move |_| {
            heights_clone.fetch_add(1, Ordering::SeqCst);
        });

        let (done, completion) = counter();
        component.update(
            Item::new("b").with_kind(DEFAULT_COMPOSITE_KIND),
            1,
            Animation::Automatic,
            completion,
        );
        dispatcher.run_until_idle();

        assert_eq!(*recorder.0.lock(), vec![1]);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(heights.load(Ordering::SeqCst), 0);
        assert_eq!(component.item(1).unwrap().kind, DEFAULT_COMPOSITE_KIND);
    }

    #[test]
    fn test_reload_without_animation_resets_data_source() {
        let f = fixture(&["a", "b"]);
        f.component.reload(None, Animation::None, None);
        f.dispatcher.run_until_idle();
        f.component.reload(None, Animation::Fade, None);
        f.dispatcher.run_until_idle();
        f.component
            .reload(Some(vec![1, 9]), Animation::Fade, None);
        f.dispatcher.run_until_idle();
        assert_eq!(
            f.interface.calls(),
            vec![
                InterfaceCall::ReloadDataSource,
                InterfaceCall::ReloadSection(0, Animation::Fade),
                InterfaceCall::Reload(vec![1], Animation::Fade),
            ]
        );
    }

    #[test]
    fn test_reload_with_diff_noop_when_equal() {
        let f = fixture(&["a", "b"]);
        let (done, completion) = counter();
        f.component
            .reload_with_diff(vec![Item::new("a"), Item::new("b")], Animation::Automatic, completion);
        f.dispatcher.run_until_idle();
        assert!(f.interface.calls().is_empty());
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
