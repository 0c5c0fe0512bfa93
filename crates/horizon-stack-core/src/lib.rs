//! Core systems for Horizon Stack.
//!
//! This crate provides the execution and notification plumbing that the
//! component framework is built on:
//!
//! - **Main queue**: a serial, thread-affine job queue for everything that
//!   touches a rendering adapter
//! - **Background pool**: rayon workers for pure work over model snapshots
//! - **Dispatcher**: the pair of contexts, with hop-and-return helpers
//! - **Signal/Slot System**: change notification between components and
//!   their owners
//! - **Thread checks**: main-queue affinity assertions
//!
//! # Example
//!
//! ```
//! use horizon_stack_core::{Dispatcher, Signal};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let dispatcher = Dispatcher::new().unwrap();
//! let settled = Arc::new(Signal::<usize>::new());
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let seen_clone = seen.clone();
//! settled.connect(move |count| seen_clone.store(*count, Ordering::SeqCst));
//!
//! let settled_clone = settled.clone();
//! dispatcher.background_then_main(
//!     || vec![1, 2, 3].len(),
//!     move |count| settled_clone.emit(count),
//! );
//!
//! dispatcher.run_until_idle();
//! assert_eq!(seen.load(Ordering::SeqCst), 3);
//! ```

pub mod dispatch;
mod error;
pub mod logging;
pub mod queue;
pub mod signal;
pub mod thread_check;
pub mod threadpool;

pub use dispatch::{Dispatcher, DispatcherConfig};
pub use error::{CoreError, Result};
pub use logging::PerfSpan;
pub use queue::{Job, JobId, MainQueue, MainQueueHandle};
pub use signal::{ConnectionId, Signal};
pub use threadpool::{BackgroundPool, PoolConfig};
