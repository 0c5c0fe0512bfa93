//! Integration tests for the component mutation engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use horizon_stack::model::{ComponentKind, ComponentModel, Item, ItemChanges};
use horizon_stack::{
    Animation, Completion, Component, ComponentManager, Dispatcher, FixedSizeView,
    HeadlessInterface, InterfaceCall, MutationPhase, Size, UserInterface, ViewRegistry,
};
use parking_lot::Mutex;

const ROW_HEIGHT: f64 = 44.0;

/// Opt-in log output: `RUST_LOG=horizon_stack::manager=trace cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    dispatcher: Dispatcher,
    component: Arc<Component>,
    interface: Arc<HeadlessInterface>,
    height_refreshes: Arc<AtomicUsize>,
}

impl Harness {
    fn new(titles: &[&str]) -> Self {
        Self::with_interface(titles, HeadlessInterface::new())
    }

    fn with_live_cells(titles: &[&str]) -> Self {
        Self::with_interface(titles, HeadlessInterface::new().with_live_cells(ROW_HEIGHT))
    }

    fn with_interface(titles: &[&str], interface: HeadlessInterface) -> Self {
        let dispatcher = Dispatcher::new().unwrap();
        Self::build(dispatcher, titles, interface)
    }

    fn build(dispatcher: Dispatcher, titles: &[&str], interface: HeadlessInterface) -> Self {
        init_tracing();
        let mut registry = ViewRegistry::new();
        registry.register_default(|| FixedSizeView::with_height(ROW_HEIGHT));

        let component = Component::new(
            ComponentModel::new(ComponentKind::List).with_items(items(titles)),
            ComponentManager::new(dispatcher.clone()),
            Arc::new(registry),
        );
        component.layout(Size::new(320.0, 0.0));

        let interface = Arc::new(interface);
        let erased: Arc<dyn UserInterface> = interface.clone();
        component.set_user_interface(&erased);

        let height_refreshes = Arc::new(AtomicUsize::new(0));
        let counter = height_refreshes.clone();
        component.signals().height_changed.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Self {
            dispatcher,
            component,
            interface,
            height_refreshes,
        }
    }

    fn run(&self) {
        self.dispatcher.run_until_idle();
    }

    fn titles(&self) -> Vec<String> {
        self.component
            .items()
            .into_iter()
            .map(|item| item.title)
            .collect()
    }

    fn assert_dense(&self) {
        for (position, item) in self.component.items().iter().enumerate() {
            assert_eq!(item.index, position, "item {:?} out of place", item.title);
        }
    }

    fn refreshes(&self) -> usize {
        self.height_refreshes.load(Ordering::SeqCst)
    }

    /// Rows the adapter holds after replaying its incremental calls.
    fn rendered_rows(&self, initial: usize) -> usize {
        self.interface
            .calls()
            .iter()
            .fold(initial, |rows, call| match call {
                InterfaceCall::Insert(indexes, _) => rows + indexes.len(),
                InterfaceCall::Delete(indexes, _) => rows - indexes.len(),
                _ => rows,
            })
    }

    fn record_phases(&self) -> Arc<Mutex<Vec<MutationPhase>>> {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = phases.clone();
        self.component
            .signals()
            .phase_changed
            .connect(move |phase| sink.lock().push(*phase));
        phases
    }
}

fn items(titles: &[&str]) -> Vec<Item> {
    titles.iter().map(|title| Item::new(*title)).collect()
}

fn numbered(range: std::ops::Range<usize>) -> Vec<Item> {
    range.map(|i| Item::new(format!("{i}"))).collect()
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
fn test_append_raises_count_and_keeps_indices_dense() {
    let harness = Harness::new(&["a", "b", "c"]);
    let (done, completion) = counter();

    harness
        .component
        .append_items(items(&["d", "e", "f", "g"]), Animation::Automatic, completion);
    harness.run();

    assert_eq!(harness.component.item_count(), 7);
    harness.assert_dense();
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::Insert(vec![3, 4, 5, 6], Animation::Automatic)]
    );
    assert_eq!(harness.component.height(), 7.0 * ROW_HEIGHT);
}

#[test]
fn test_prepend_reports_descending_indices() {
    let harness = Harness::new(&["c"]);
    harness
        .component
        .prepend_items(items(&["a", "b"]), Animation::Top, None);
    harness.run();

    assert_eq!(harness.titles(), vec!["a", "b", "c"]);
    harness.assert_dense();
    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::Insert(vec![1, 0], Animation::Top)]
    );
}

#[test]
fn test_repeated_prepend_and_append_sum_up() {
    let harness = Harness::new(&[]);

    for round in 0..25 {
        let base = round * 20;
        harness
            .component
            .prepend_items(numbered(base..base + 10), Animation::Automatic, None);
        harness
            .component
            .append_items(numbered(base + 10..base + 20), Animation::Automatic, None);
    }
    harness.run();

    assert_eq!(harness.component.item_count(), 500);
    harness.assert_dense();
    assert_eq!(harness.component.height(), 500.0 * ROW_HEIGHT);

    let calls = harness.interface.calls();
    assert_eq!(calls[0], InterfaceCall::ReloadDataSource);
    assert_eq!(calls.len(), 50);
    assert!(calls[1..]
        .iter()
        .all(|call| matches!(call, InterfaceCall::Insert(indexes, _) if indexes.len() == 10)));
}

#[test]
fn test_delete_indexes_removes_originals() {
    let names: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    let titles: Vec<&str> = names.iter().map(String::as_str).collect();
    let harness = Harness::new(&titles);

    harness
        .component
        .delete_indexes(vec![3, 1, 4], Animation::Fade, None);
    harness.run();

    assert_eq!(harness.component.item_count(), 7);
    assert_eq!(harness.titles(), vec!["0", "2", "5", "6", "7", "8", "9"]);
    harness.assert_dense();
    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::Delete(vec![1, 3, 4], Animation::Fade)]
    );
}

#[test]
fn test_delete_ignores_invalid_indices() {
    let harness = Harness::new(&["a", "b"]);
    let (done, completion) = counter();

    harness
        .component
        .delete_indexes(vec![5, 9], Animation::Automatic, completion);
    harness.run();

    assert_eq!(harness.component.item_count(), 2);
    assert!(harness.interface.calls().is_empty());
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn test_same_height_update_skips_height_refresh() {
    let harness = Harness::with_live_cells(&["a", "b", "c"]);
    let (done, completion) = counter();

    harness
        .component
        .update(Item::new("B"), 1, Animation::Automatic, completion);
    harness.run();

    assert_eq!(harness.titles(), vec!["a", "B", "c"]);
    assert_eq!(harness.refreshes(), 0);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert!(harness.interface.calls().is_empty());

    let cell = harness.interface.cell(1).unwrap();
    assert_eq!(cell.configure_count(), 1);
    assert_eq!(cell.configured_item().unwrap().title, "B");
}

#[test]
fn test_height_change_update_reloads_row_and_refreshes_once() {
    let harness = Harness::new(&["a", "b", "c"]);
    let (done, completion) = counter();

    harness.component.update(
        Item::new("b").with_height(100.0),
        1,
        Animation::Automatic,
        completion,
    );
    harness.run();

    assert_eq!(harness.refreshes(), 1);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::Reload(vec![1], Animation::Automatic)]
    );
    assert_eq!(harness.component.height(), 2.0 * ROW_HEIGHT + 100.0);
}

#[test]
fn test_height_change_with_live_cell_reconfigures_in_transaction() {
    let harness = Harness::with_live_cells(&["a", "b"]);

    harness.component.update(
        Item::new("b").with_height(80.0),
        1,
        Animation::Fade,
        None,
    );
    harness.run();

    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::BeginUpdates, InterfaceCall::EndUpdates]
    );
    assert_eq!(harness.refreshes(), 1);
    assert_eq!(harness.interface.cell(1).unwrap().configure_count(), 1);
}

#[test]
fn test_height_change_without_animation_reloads_row() {
    let harness = Harness::with_live_cells(&["a", "b"]);

    harness
        .component
        .update(Item::new("b").with_height(80.0), 1, Animation::None, None);
    harness.run();

    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::Reload(vec![1], Animation::None)]
    );
}

#[test]
fn test_reload_if_needed_with_equal_items_is_silent() {
    let harness = Harness::new(&["a", "b", "c"]);
    let (done, completion) = counter();

    harness
        .component
        .reload_if_needed(items(&["a", "b", "c"]), Animation::Automatic, completion);
    harness.run();

    assert!(harness.interface.calls().is_empty());
    assert_eq!(harness.refreshes(), 0);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reload_if_needed_reloads_only_changed_positions() {
    let harness = Harness::new(&[]);
    let mut initial = items(&["a", "b", "c", "d", "e"]);
    initial[0] = Item::new("a").with_height(60.0);
    harness
        .component
        .append_items(initial, Animation::Automatic, None);
    harness.run();
    harness.interface.clear();

    let next = items(&["a", "b", "C", "d", "e"]);
    harness
        .component
        .reload_if_needed(next, Animation::Automatic, None);
    harness.run();

    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::Reload(vec![2], Animation::Automatic)]
    );
    assert_eq!(harness.component.item(0).unwrap().size.height, 60.0);
    assert_eq!(harness.component.item(2).unwrap().title, "C");
    assert_eq!(harness.component.item(2).unwrap().size.height, ROW_HEIGHT);
    harness.assert_dense();
}

#[test]
fn test_reload_if_needed_with_new_count_reloads_everything() {
    let harness = Harness::new(&["a", "b"]);
    harness
        .component
        .reload_if_needed(items(&["x", "y", "z"]), Animation::Automatic, None);
    harness.run();

    assert_eq!(harness.interface.calls(), vec![InterfaceCall::ReloadDataSource]);
    assert_eq!(harness.titles(), vec!["x", "y", "z"]);
    assert_eq!(harness.component.height(), 3.0 * ROW_HEIGHT);
}

#[test]
fn test_changes_apply_structure_then_updates() {
    let harness = Harness::with_live_cells(&["a", "b", "c"]);
    let old = harness.component.items();
    let new = items(&["a", "B", "c", "d"]);
    let changes = ItemChanges::between(&old, &new).unwrap();
    let (done, completion) = counter();

    harness
        .component
        .reload_if_needed_with_changes(changes, new, Animation::Automatic, completion);
    harness.run();

    assert_eq!(harness.titles(), vec!["a", "B", "c", "d"]);
    harness.assert_dense();
    assert_eq!(
        harness.interface.calls(),
        vec![
            InterfaceCall::BeginUpdates,
            InterfaceCall::Insert(vec![3], Animation::Automatic),
            InterfaceCall::EndUpdates,
        ]
    );
    assert_eq!(harness.interface.cell(1).unwrap().configured_item().unwrap().title, "B");
    assert_eq!(harness.refreshes(), 1);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(harness.component.height(), 4.0 * ROW_HEIGHT);
}

#[test]
fn test_reload_with_diff_deletes_and_settles_once() {
    let harness = Harness::new(&["a", "b", "c"]);
    let phases = Arc::new(Mutex::new(Vec::new()));
    let sink = phases.clone();
    harness
        .component
        .signals()
        .phase_changed
        .connect(move |phase| sink.lock().push(*phase));
    let (done, completion) = counter();

    harness
        .component
        .reload_with_diff(items(&["a", "b"]), Animation::Automatic, completion);
    harness.run();

    assert_eq!(
        harness.interface.calls(),
        vec![
            InterfaceCall::BeginUpdates,
            InterfaceCall::Delete(vec![2], Animation::Automatic),
            InterfaceCall::EndUpdates,
        ]
    );
    assert_eq!(done.load(Ordering::SeqCst), 1);
    let settled = phases
        .lock()
        .iter()
        .filter(|phase| **phase == MutationPhase::Settled)
        .count();
    assert_eq!(settled, 1);
}

#[test]
fn test_completion_fires_for_released_component() {
    let harness = Harness::new(&["a"]);
    let (done, completion) = counter();

    harness
        .component
        .append(Item::new("b"), Animation::Automatic, completion);
    let Harness {
        dispatcher,
        component,
        interface,
        ..
    } = harness;
    drop(component);
    dispatcher.run_until_idle();

    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert!(interface.calls().is_empty());
}

#[test]
fn test_deferred_adapter_completions() {
    let dispatcher = Dispatcher::new().unwrap();
    let harness = Harness::build(
        dispatcher.clone(),
        &["a"],
        HeadlessInterface::new().with_deferred_completions(dispatcher),
    );
    let (done, completion) = counter();

    harness
        .component
        .insert(Item::new("b"), 0, Animation::Automatic, completion);
    harness.run();

    assert_eq!(harness.titles(), vec!["b", "a"]);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(harness.refreshes(), 1);
}

#[test]
fn test_operations_apply_in_submission_order() {
    let harness = Harness::new(&["a"]);
    harness
        .component
        .append(Item::new("b"), Animation::Automatic, None);
    harness
        .component
        .insert(Item::new("first"), 0, Animation::Automatic, None);
    harness.component.delete(2, Animation::Automatic, None);
    harness.run();

    assert_eq!(harness.titles(), vec!["first", "a"]);
    harness.assert_dense();
}

#[test]
fn test_mutation_queued_behind_diff_keeps_rows_in_step() {
    let harness = Harness::new(&["a", "b", "c"]);
    harness
        .component
        .reload_with_diff(items(&["a", "b"]), Animation::Automatic, None);
    harness
        .component
        .append(Item::new("d"), Animation::Automatic, None);
    harness.run();

    assert_eq!(harness.titles(), vec!["a", "b", "d"]);
    assert_eq!(harness.rendered_rows(3), harness.component.item_count());
    assert_eq!(
        harness.interface.calls(),
        vec![
            InterfaceCall::BeginUpdates,
            InterfaceCall::Delete(vec![2], Animation::Automatic),
            InterfaceCall::EndUpdates,
            InterfaceCall::Insert(vec![2], Animation::Automatic),
        ]
    );
    harness.assert_dense();
}

#[test]
fn test_update_queued_behind_reload_if_needed_applies_last() {
    let harness = Harness::new(&["a", "b", "c"]);
    harness
        .component
        .reload_if_needed(items(&["a", "X", "c"]), Animation::Automatic, None);
    harness
        .component
        .update(Item::new("B"), 1, Animation::Automatic, None);
    harness.run();

    assert_eq!(harness.titles(), vec!["a", "B", "c"]);
    assert_eq!(
        harness.interface.calls(),
        vec![InterfaceCall::Reload(vec![1], Animation::Automatic)]
    );
    assert_eq!(harness.rendered_rows(3), harness.component.item_count());
}

#[test]
fn test_delete_queued_behind_reload_keeps_rows_in_step() {
    let harness = Harness::new(&["a", "b", "c", "d"]);
    harness
        .component
        .reload(Some(vec![0, 3]), Animation::Automatic, None);
    harness.component.delete(3, Animation::Automatic, None);
    harness.run();

    assert_eq!(harness.titles(), vec!["a", "b", "c"]);
    assert_eq!(
        harness.interface.calls(),
        vec![
            InterfaceCall::Reload(vec![0, 3], Animation::Automatic),
            InterfaceCall::Delete(vec![3], Animation::Automatic),
        ]
    );
    assert_eq!(harness.rendered_rows(4), harness.component.item_count());
}

#[test]
fn test_operations_wait_for_the_running_one_to_settle() {
    let harness = Harness::new(&["a"]);
    let (done, completion) = counter();

    harness
        .component
        .reload_with_diff(items(&["a", "b"]), Animation::Automatic, None);
    harness
        .component
        .delete(0, Animation::Automatic, completion);
    assert_eq!(harness.component.pending_operations(), 2);

    harness.run();
    assert_eq!(harness.component.pending_operations(), 0);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(harness.titles(), vec!["b"]);
    harness.assert_dense();
}

#[test]
fn test_diff_with_deferred_adapter_settles_once_after_confirmation() {
    let dispatcher = Dispatcher::new().unwrap();
    let harness = Harness::build(
        dispatcher.clone(),
        &["a", "b", "c"],
        HeadlessInterface::new().with_deferred_completions(dispatcher),
    );
    let phases = harness.record_phases();
    let (done, completion) = counter();

    harness
        .component
        .reload_with_diff(items(&["a", "c", "d", "e"]), Animation::Fade, completion);
    harness
        .component
        .append(Item::new("f"), Animation::Fade, None);
    harness.run();

    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(harness.titles(), vec!["a", "c", "d", "e", "f"]);
    assert_eq!(harness.rendered_rows(3), harness.component.item_count());
    assert_eq!(harness.component.height(), 5.0 * ROW_HEIGHT);

    let phases = phases.lock();
    let settled = phases
        .iter()
        .filter(|phase| **phase == MutationPhase::Settled)
        .count();
    assert_eq!(settled, 2);
    assert_eq!(phases.last(), Some(&MutationPhase::Settled));
}

#[test]
fn test_requested_size_alone_does_not_count_as_a_change() {
    let harness = Harness::new(&["a", "b"]);
    let resized = vec![Item::new("a").with_height(90.0), Item::new("b")];

    harness
        .component
        .reload_if_needed(resized, Animation::Automatic, None);
    harness.run();

    assert!(harness.interface.calls().is_empty());
    assert_eq!(harness.component.item(0).unwrap().size.height, ROW_HEIGHT);

    harness
        .component
        .update(Item::new("a").with_height(90.0), 0, Animation::Automatic, None);
    harness.run();
    assert_eq!(harness.component.item(0).unwrap().size.height, 90.0);
}
