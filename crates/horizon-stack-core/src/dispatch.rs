//! The two execution contexts used by the mutation engine.
//!
//! A [`Dispatcher`] pairs a [`MainQueue`] (UI affinity, strictly serial) with
//! a [`BackgroundPool`] (pure work over model snapshots). It is cheap to
//! clone and safe to capture in closures that run on either context.
//!
//! # Example
//!
//! ```
//! use horizon_stack_core::Dispatcher;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let dispatcher = Dispatcher::new().unwrap();
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let total_clone = total.clone();
//! dispatcher.background_then_main(
//!     || (1..=10).sum::<usize>(),
//!     move |sum| total_clone.store(sum, Ordering::SeqCst),
//! );
//!
//! dispatcher.run_until_idle();
//! assert_eq!(total.load(Ordering::SeqCst), 55);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CoreError;
use crate::queue::{JobId, MainQueue, MainQueueHandle};
use crate::threadpool::{BackgroundPool, PoolConfig};

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Background pool configuration.
    pub pool: PoolConfig,
}

impl DispatcherConfig {
    /// Configuration with a fixed number of background threads.
    pub fn with_background_threads(threads: usize) -> Self {
        Self {
            pool: PoolConfig::with_threads(threads),
        }
    }
}

struct DispatcherInner {
    main: MainQueue,
    main_handle: MainQueueHandle,
    background: BackgroundPool,
}

/// Handle to the main and background execution contexts.
///
/// The thread that creates the dispatcher owns its main queue and is the
/// only thread allowed to drain it.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration, owned by the current
    /// thread.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_config(DispatcherConfig::default())
    }

    /// Create a dispatcher with custom configuration.
    pub fn with_config(config: DispatcherConfig) -> Result<Self, CoreError> {
        let background = BackgroundPool::new(config.pool)?;
        let main = MainQueue::new();
        let main_handle = main.handle();
        crate::stack_debug!(threads = background.num_threads(), "dispatcher created");
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                main,
                main_handle,
                background,
            }),
        })
    }

    /// Post a job to the main context. Never runs inline.
    pub fn main<F>(&self, job: F) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.main_handle.post(job)
    }

    /// Run a job on the background context.
    pub fn background<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.background.spawn(job);
    }

    /// Run `task` on the background context, then `then` with its result on
    /// the main context.
    pub fn background_then_main<F, T, C>(&self, task: F, then: C)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        self.inner
            .background
            .spawn_with_callback(self.inner.main_handle.clone(), task, then);
    }

    /// Returns `true` on the thread that owns the main queue.
    pub fn is_main_thread(&self) -> bool {
        self.inner.main.is_owner_thread()
    }

    /// Number of main jobs waiting to run.
    pub fn pending_main_jobs(&self) -> usize {
        self.inner.main.pending_count()
    }

    /// Number of background tasks still in flight.
    pub fn active_background_tasks(&self) -> usize {
        self.inner.background.active_tasks()
    }

    /// Drain the main queue once (including jobs posted while draining).
    pub fn run_pending(&self) -> usize {
        self.inner.main.run_pending()
    }

    /// Drain the main queue until both contexts are idle.
    ///
    /// Blocks while background tasks are still running, executing their
    /// continuations as they arrive.
    pub fn run_until_idle(&self) {
        let background = &self.inner.background;
        self.inner
            .main
            .run_until(None, || background.active_tasks() == 0);
    }

    /// Like [`run_until_idle`](Self::run_until_idle) but gives up after
    /// `timeout`. Returns `true` if both contexts became idle.
    pub fn run_until_idle_timeout(&self, timeout: Duration) -> bool {
        let background = &self.inner.background;
        self.inner
            .main
            .run_until(Some(Instant::now() + timeout), || {
                background.active_tasks() == 0
            })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("main", &self.inner.main)
            .field("background", &self.inner.background)
            .finish()
    }
}
