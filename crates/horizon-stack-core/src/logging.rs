//! Logging facilities for Horizon Stack.
//!
//! Horizon Stack uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_stack=debug,horizon_stack::manager=trace")
//!     .init();
//! ```
//!
//! The [`targets`] constants name every subsystem so filters can be written
//! without guessing module paths.

/// Target names for log filtering.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_stack_core";
    /// Main queue target.
    pub const QUEUE: &str = "horizon_stack_core::queue";
    /// Dispatcher target.
    pub const DISPATCH: &str = "horizon_stack_core::dispatch";
    /// Signal system target.
    pub const SIGNAL: &str = "horizon_stack_core::signal";
    /// Mutation engine target.
    pub const MANAGER: &str = "horizon_stack::manager";
    /// Component target.
    pub const COMPONENT: &str = "horizon_stack::component";
    /// Controller target.
    pub const CONTROLLER: &str = "horizon_stack::controller";
    /// Rendering adapter target.
    pub const INTERFACE: &str = "horizon_stack::interface";
    /// Performance spans.
    pub const PERF: &str = "horizon_stack::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to measure layout passes and diff computations.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_stack::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

/// Trace-level log with the core target.
#[macro_export]
macro_rules! stack_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "horizon_stack_core", $($arg)*)
    };
}

/// Debug-level log with the core target.
#[macro_export]
macro_rules! stack_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "horizon_stack_core", $($arg)*)
    };
}

/// Warn-level log with the core target.
#[macro_export]
macro_rules! stack_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "horizon_stack_core", $($arg)*)
    };
}
