//! A recording adapter for hosts without a rendering surface.

use std::collections::HashMap;
use std::sync::Arc;

use horizon_stack_core::Dispatcher;
use parking_lot::Mutex;

use super::{Animation, Completion, UserInterface};
use crate::view::{FixedSizeView, ItemView};

/// One call received by a [`HeadlessInterface`].
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceCall {
    ReloadDataSource,
    Insert(Vec<usize>, Animation),
    Delete(Vec<usize>, Animation),
    Reload(Vec<usize>, Animation),
    ReloadSection(usize, Animation),
    BeginUpdates,
    EndUpdates,
}

impl InterfaceCall {
    /// Returns `true` for calls that change rows on screen.
    pub fn is_structural(&self) -> bool {
        !matches!(self, InterfaceCall::BeginUpdates | InterfaceCall::EndUpdates)
    }
}

/// A [`UserInterface`] that records every call and renders nothing.
///
/// By default completions run synchronously. With
/// [`with_deferred_completions`](Self::with_deferred_completions) they are
/// posted to the main queue instead, the way an animating surface would
/// report back after the animation ends.
///
/// With [`with_live_cells`](Self::with_live_cells) every index has an
/// on-screen cell, so in-place reconfiguration can be observed.
#[derive(Default)]
pub struct HeadlessInterface {
    calls: Mutex<Vec<InterfaceCall>>,
    cells: Option<Mutex<HashMap<usize, Arc<FixedSizeView>>>>,
    cell_height: f64,
    deferred: Option<Dispatcher>,
}

impl HeadlessInterface {
    /// Create an adapter with synchronous completions and no live cells.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a live cell of `height` at every index.
    pub fn with_live_cells(mut self, height: f64) -> Self {
        self.cells = Some(Mutex::new(HashMap::new()));
        self.cell_height = height;
        self
    }

    /// Post completions to `dispatcher`'s main queue instead of running them
    /// inline.
    pub fn with_deferred_completions(mut self, dispatcher: Dispatcher) -> Self {
        self.deferred = Some(dispatcher);
        self
    }

    /// Snapshot of every recorded call.
    pub fn calls(&self) -> Vec<InterfaceCall> {
        self.calls.lock().clone()
    }

    /// Take the recorded calls, leaving the log empty.
    pub fn take_calls(&self) -> Vec<InterfaceCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Forget every recorded call.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Number of recorded calls, transaction markers included.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Recorded calls that changed rows on screen.
    pub fn structural_calls(&self) -> Vec<InterfaceCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.is_structural())
            .cloned()
            .collect()
    }

    /// The live cell at `index`, if live cells are enabled and one has been
    /// handed out.
    pub fn cell(&self, index: usize) -> Option<Arc<FixedSizeView>> {
        self.cells.as_ref()?.lock().get(&index).cloned()
    }

    fn record(&self, call: InterfaceCall) {
        tracing::trace!(target: "horizon_stack::interface", ?call, "headless call");
        self.calls.lock().push(call);
    }

    fn finish(&self, completion: Completion) {
        match &self.deferred {
            Some(dispatcher) => {
                dispatcher.main(completion);
            }
            None => completion(),
        }
    }
}

impl UserInterface for HeadlessInterface {
    fn reload_data_source(&self) {
        self.record(InterfaceCall::ReloadDataSource);
        if let Some(cells) = &self.cells {
            cells.lock().clear();
        }
    }

    fn insert(&self, indexes: &[usize], animation: Animation, completion: Completion) {
        self.record(InterfaceCall::Insert(indexes.to_vec(), animation));
        self.finish(completion);
    }

    fn delete(&self, indexes: &[usize], animation: Animation, completion: Completion) {
        self.record(InterfaceCall::Delete(indexes.to_vec(), animation));
        self.finish(completion);
    }

    fn reload(&self, indexes: &[usize], animation: Animation, completion: Completion) {
        self.record(InterfaceCall::Reload(indexes.to_vec(), animation));
        self.finish(completion);
    }

    fn reload_section(&self, section: usize, animation: Animation, completion: Completion) {
        self.record(InterfaceCall::ReloadSection(section, animation));
        self.finish(completion);
    }

    fn begin_updates(&self) {
        self.record(InterfaceCall::BeginUpdates);
    }

    fn end_updates(&self) {
        self.record(InterfaceCall::EndUpdates);
    }

    fn view_at(&self, index: usize) -> Option<Arc<dyn ItemView>> {
        let cells = self.cells.as_ref()?;
        let cell = cells
            .lock()
            .entry(index)
            .or_insert_with(|| Arc::new(FixedSizeView::with_height(self.cell_height)))
            .clone();
        Some(cell as Arc<dyn ItemView>)
    }
}

impl std::fmt::Debug for HeadlessInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessInterface")
            .field("calls", &self.calls.lock().len())
            .field("live_cells", &self.cells.is_some())
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}
