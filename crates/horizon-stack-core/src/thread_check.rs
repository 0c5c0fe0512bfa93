//! Main-queue affinity checks.
//!
//! Every call into a rendering adapter must happen on the thread that drains
//! the main queue. The [`MainQueue`](crate::MainQueue) records that thread in
//! a [`ThreadAffinity`] when it is created, and the engine asserts against it
//! before touching an adapter.
//!
//! # Usage
//!
//! ```
//! use horizon_stack_core::thread_check::ThreadAffinity;
//!
//! let affinity = ThreadAffinity::current();
//! assert!(affinity.is_same_thread());
//! ```
//!
//! Two levels of checking are provided:
//!
//! - **Debug assertions** (`debug_assert_main_queue!`): only active in debug
//!   builds, and only while checks are enabled.
//! - **Runtime assertions** (`assert_main_queue!`): always active.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

/// Flag to enable/disable runtime thread checks globally.
static THREAD_CHECKS_ENABLED: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

thread_local! {
    /// Number of live main queues owned by this thread.
    static MAIN_QUEUES_ON_THREAD: Cell<usize> = const { Cell::new(0) };
}

pub(crate) fn register_main_queue_thread() {
    MAIN_QUEUES_ON_THREAD.with(|count| count.set(count.get() + 1));
}

pub(crate) fn unregister_main_queue_thread() {
    MAIN_QUEUES_ON_THREAD.with(|count| count.set(count.get().saturating_sub(1)));
}

/// Returns `true` if the current thread owns at least one main queue.
///
/// Background pool threads never own a main queue, so this is `false` for
/// any work running on the background context.
#[inline]
pub fn is_main_queue_thread() -> bool {
    MAIN_QUEUES_ON_THREAD.with(|count| count.get() > 0)
}

/// Enable or disable runtime thread checks.
///
/// By default, thread checks are enabled in debug builds and disabled in
/// release builds.
pub fn set_thread_checks_enabled(enabled: bool) {
    THREAD_CHECKS_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Check if runtime thread checks are currently enabled.
#[inline]
pub fn are_thread_checks_enabled() -> bool {
    THREAD_CHECKS_ENABLED.load(Ordering::Relaxed)
}

/// Panics if the current thread does not own a main queue.
///
/// This is always active (in both debug and release builds).
#[macro_export]
macro_rules! assert_main_queue {
    () => {
        $crate::assert_main_queue!("operation must be performed on the main queue")
    };
    ($msg:expr) => {
        if !$crate::thread_check::is_main_queue_thread() {
            $crate::thread_check::panic_not_main_queue($msg, file!(), line!());
        }
    };
}

/// Debug-only assertion that panics if not on a main-queue thread.
///
/// Skipped in release builds and whenever checks have been disabled with
/// [`set_thread_checks_enabled`](crate::thread_check::set_thread_checks_enabled).
#[macro_export]
macro_rules! debug_assert_main_queue {
    () => {
        #[cfg(debug_assertions)]
        if $crate::thread_check::are_thread_checks_enabled() {
            $crate::assert_main_queue!()
        }
    };
    ($msg:expr) => {
        #[cfg(debug_assertions)]
        if $crate::thread_check::are_thread_checks_enabled() {
            $crate::assert_main_queue!($msg)
        }
    };
}

#[cold]
#[inline(never)]
#[doc(hidden)]
pub fn panic_not_main_queue(msg: &str, file: &str, line: u32) -> ! {
    let current = std::thread::current();
    let current_name = current.name().unwrap_or("<unnamed>");
    let current_id = current.id();

    panic!(
        "\n\
        ══════════════════════════════════════════════════════════════════════\n\
        MAIN QUEUE VIOLATION\n\
        ══════════════════════════════════════════════════════════════════════\n\
        \n\
        {msg}\n\
        \n\
        Location: {file}:{line}\n\
        Current thread: \"{current_name}\" (ID: {current_id:?})\n\
        \n\
        Adapter calls and layout passes must run on the thread that drains\n\
        the main queue. Post the work with Dispatcher::main(), or use\n\
        Dispatcher::background_then_main() to hand a background result back.\n\
        ══════════════════════════════════════════════════════════════════════"
    )
}

/// The thread a main queue was created on.
#[derive(Debug, Clone, Copy)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl ThreadAffinity {
    /// Bind to the calling thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Returns `true` on the bound thread.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Panics with `msg` when called off the bound thread.
    pub fn assert_same_thread_with_msg(&self, msg: &str) {
        if !self.is_same_thread() {
            let current = std::thread::current();
            panic!(
                "{msg}: queue owned by {:?}, called from \"{}\" ({:?})",
                self.thread_id,
                current.name().unwrap_or("<unnamed>"),
                current.id()
            );
        }
    }
}
