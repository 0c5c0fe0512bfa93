//! The rendering-adapter contract.
//!
//! A [`UserInterface`] is the platform's scrollable view for one component.
//! The mutation engine depends only on this capability contract and never
//! on a concrete toolkit. Every method is called from the main queue.
//!
//! Completion callbacks must be invoked exactly once. They may be invoked
//! synchronously or later (after an animation), but always on the main
//! queue.

mod headless;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::ItemChanges;
use crate::view::ItemView;

pub use headless::{HeadlessInterface, InterfaceCall};

/// A one-shot callback fired when an operation settles.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Invoke an optional completion.
pub(crate) fn complete(completion: Option<Completion>) {
    if let Some(completion) = completion {
        completion();
    }
}

/// Fires one completion after every member has reported back.
///
/// Starts with one implicit member held by the creator, released with
/// [`release`](Self::release), so the completion cannot fire while members
/// are still being handed out.
pub(crate) struct CompletionGroup {
    remaining: AtomicUsize,
    completion: Mutex<Option<Completion>>,
}

impl CompletionGroup {
    pub(crate) fn new(completion: Option<Completion>) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(1),
            completion: Mutex::new(completion),
        })
    }

    pub(crate) fn member(self: &Arc<Self>) -> Completion {
        self.remaining.fetch_add(1, Ordering::AcqRel);
        let group = self.clone();
        Box::new(move || group.release())
    }

    pub(crate) fn release(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let completion = self.completion.lock().take();
            complete(completion);
        }
    }
}

/// How a view transition should be animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    /// Let the platform pick.
    #[default]
    Automatic,
    /// No animation. Reloads become raw data-source resets.
    None,
    Fade,
    Left,
    Right,
    Top,
    Bottom,
    Middle,
}

impl Animation {
    /// Returns `true` unless this is [`Animation::None`].
    pub fn is_animated(self) -> bool {
        self != Animation::None
    }
}

/// The capability contract a rendering surface implements.
pub trait UserInterface: Send + Sync {
    /// Throw away all rendered state and re-read the data source.
    fn reload_data_source(&self);

    /// Insert rows at `indexes` (positions in the updated model).
    fn insert(&self, indexes: &[usize], animation: Animation, completion: Completion);

    /// Delete rows at `indexes` (positions in the model before removal).
    fn delete(&self, indexes: &[usize], animation: Animation, completion: Completion);

    /// Reload rows at `indexes`.
    fn reload(&self, indexes: &[usize], animation: Animation, completion: Completion);

    /// Reload an entire section.
    fn reload_section(&self, section: usize, animation: Animation, completion: Completion);

    /// Open a batch-edit transaction.
    fn begin_updates(&self);

    /// Close a batch-edit transaction.
    fn end_updates(&self);

    /// The live cell at `index`, if one is currently on screen.
    fn view_at(&self, index: usize) -> Option<Arc<dyn ItemView>>;

    /// Apply a structural change set.
    ///
    /// `update_data_source` must run before any row is touched, so the view
    /// always reads the mutated model. The default applies deletions,
    /// insertions and reloads inside one update transaction.
    fn process(
        &self,
        changes: &ItemChanges,
        animation: Animation,
        update_data_source: Completion,
        completion: Completion,
    ) {
        apply_change_set(self, changes, animation, update_data_source, completion);
    }
}

/// Scoped batch-edit transaction.
///
/// Calls `begin_updates` on creation and `end_updates` when dropped, so the
/// transaction is closed on every exit path.
pub struct UpdateTransaction<'a, U: UserInterface + ?Sized> {
    interface: &'a U,
}

impl<'a, U: UserInterface + ?Sized> UpdateTransaction<'a, U> {
    /// Open a transaction on `interface`.
    pub fn begin(interface: &'a U) -> Self {
        interface.begin_updates();
        Self { interface }
    }
}

impl<U: UserInterface + ?Sized> Drop for UpdateTransaction<'_, U> {
    fn drop(&mut self) {
        self.interface.end_updates();
    }
}

/// Default change-set application used by [`UserInterface::process`].
pub fn apply_change_set<U: UserInterface + ?Sized>(
    interface: &U,
    changes: &ItemChanges,
    animation: Animation,
    update_data_source: Completion,
    completion: Completion,
) {
    update_data_source();

    if !changes.has_structural_changes() {
        completion();
        return;
    }

    // The completion waits for every row call the adapter confirms.
    let group = CompletionGroup::new(Some(completion));
    {
        let _transaction = UpdateTransaction::begin(interface);
        if !changes.deletions.is_empty() {
            interface.delete(&changes.deletion_indexes(), animation, group.member());
        }
        if !changes.insertions.is_empty() {
            interface.insert(&changes.insertion_indexes(), animation, group.member());
        }
        if !changes.reloads.is_empty() {
            interface.reload(&changes.reload_indexes(), animation, group.member());
        }
    }
    group.release();
}
