//! Background pool for pure, model-reading work.
//!
//! Built on rayon's work-stealing scheduler. Tasks submitted here must never
//! touch a rendering adapter; results that need the main context are handed
//! back through a [`MainQueueHandle`] with
//! [`spawn_with_callback`](BackgroundPool::spawn_with_callback).
//!
//! # Example
//!
//! ```
//! use horizon_stack_core::threadpool::{BackgroundPool, PoolConfig};
//!
//! let pool = BackgroundPool::new(PoolConfig::with_threads(2)).unwrap();
//! assert_eq!(pool.execute(|| 40 + 2), 42);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::error::CoreError;
use crate::queue::MainQueueHandle;

/// Configuration for creating a background pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads. `None` means use the number of CPU cores.
    pub num_threads: Option<usize>,
    /// Name prefix for worker threads.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name: "horizon-background".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with custom thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }
}

/// Tracks a spawned task until it has handed off its result.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A pool of worker threads for the background execution context.
pub struct BackgroundPool {
    pool: RayonThreadPool,
    active_tasks: Arc<AtomicUsize>,
}

impl BackgroundPool {
    /// Create a new pool with the given configuration.
    pub fn new(config: PoolConfig) -> Result<Self, CoreError> {
        let thread_name = config.thread_name.clone();
        let mut builder =
            ThreadPoolBuilder::new().thread_name(move |index| format!("{thread_name}-{index}"));

        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }

        let pool = builder
            .build()
            .map_err(|e| CoreError::PoolCreation(e.to_string()))?;

        Ok(Self {
            pool,
            active_tasks: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get the number of threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Get the number of tasks that have been spawned but not yet finished
    /// (including handing their continuation to the main queue).
    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::Acquire)
    }

    /// Spawn a fire-and-forget task.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = ActiveGuard::new(&self.active_tasks);
        self.pool.spawn(move || {
            task();
            drop(guard);
        });
    }

    /// Spawn a task and deliver its result to the main queue.
    ///
    /// The task is counted as active until the callback has been posted, so
    /// a caller draining the main queue never observes an idle pool with a
    /// continuation still in flight.
    pub fn spawn_with_callback<F, T, C>(&self, main: MainQueueHandle, task: F, callback: C)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let guard = ActiveGuard::new(&self.active_tasks);
        self.pool.spawn(move || {
            let result = task();
            main.post(move || callback(result));
            drop(guard);
        });
    }

    /// Execute a closure on the pool and block until completion.
    pub fn execute<F, T>(&self, task: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.pool.install(task)
    }
}

impl std::fmt::Debug for BackgroundPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundPool")
            .field("num_threads", &self.num_threads())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}
