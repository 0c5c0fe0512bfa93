//! Serial main queue for UI-affinity work.
//!
//! Jobs posted from any thread are executed in FIFO order on the thread that
//! created the queue, whenever that thread drains it. This is the single
//! writer for component models and the only place adapter calls are made.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::thread_check::{self, ThreadAffinity};

/// A boxed job closure.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A unique identifier for a posted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Get the raw u64 value of this job ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique job IDs.
static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

fn next_job_id() -> JobId {
    JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
}

struct QueuedJob {
    id: JobId,
    job: Job,
}

/// Cloneable sending half of a [`MainQueue`].
///
/// Background tasks hold one of these to hand their continuation back to the
/// main queue.
#[derive(Clone)]
pub struct MainQueueHandle {
    sender: Sender<QueuedJob>,
}

impl MainQueueHandle {
    /// Post a job to the main queue.
    pub fn post<F>(&self, job: F) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = next_job_id();
        if self
            .sender
            .send(QueuedJob {
                id,
                job: Box::new(job),
            })
            .is_err()
        {
            tracing::warn!(target: "horizon_stack_core::queue", ?id, "main queue closed, job dropped");
        }
        id
    }
}

impl std::fmt::Debug for MainQueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueueHandle")
            .field("pending", &self.sender.len())
            .finish()
    }
}

/// The main (UI-affinity) serial queue.
pub struct MainQueue {
    sender: Sender<QueuedJob>,
    receiver: Receiver<QueuedJob>,
    affinity: ThreadAffinity,
    executed: AtomicU64,
}

impl MainQueue {
    /// Create a queue owned by the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        thread_check::register_main_queue_thread();
        Self {
            sender,
            receiver,
            affinity: ThreadAffinity::current(),
            executed: AtomicU64::new(0),
        }
    }

    /// Get a sending handle for this queue.
    pub fn handle(&self) -> MainQueueHandle {
        MainQueueHandle {
            sender: self.sender.clone(),
        }
    }

    /// Post a job to be executed on the owning thread.
    pub fn post<F>(&self, job: F) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle().post(job)
    }

    /// Returns `true` if called on the thread that owns this queue.
    #[inline]
    pub fn is_owner_thread(&self) -> bool {
        self.affinity.is_same_thread()
    }

    /// Check if there are any pending jobs.
    pub fn has_pending(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Get the number of pending jobs.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Total number of jobs executed so far.
    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Execute every pending job, including jobs posted while draining.
    ///
    /// Returns the number of jobs executed.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    pub fn run_pending(&self) -> usize {
        self.affinity
            .assert_same_thread_with_msg("main queue drained from a foreign thread");
        let mut count = 0;
        while let Ok(queued) = self.receiver.try_recv() {
            self.execute(queued);
            count += 1;
        }
        count
    }

    /// Wait up to `timeout` for one job and execute it.
    ///
    /// Returns `true` if a job was executed.
    pub fn run_next_timeout(&self, timeout: Duration) -> bool {
        self.affinity
            .assert_same_thread_with_msg("main queue drained from a foreign thread");
        match self.receiver.recv_timeout(timeout) {
            Ok(queued) => {
                self.execute(queued);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Drain the queue until `is_idle` reports no outstanding work or the
    /// deadline passes.
    pub(crate) fn run_until<F>(&self, deadline: Option<Instant>, is_idle: F) -> bool
    where
        F: Fn() -> bool,
    {
        loop {
            self.run_pending();
            if is_idle() && !self.has_pending() {
                return true;
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    (deadline - now).min(Duration::from_millis(5))
                }
                None => Duration::from_millis(5),
            };
            self.run_next_timeout(wait);
        }
    }

    fn execute(&self, queued: QueuedJob) {
        tracing::trace!(target: "horizon_stack_core::queue", id = queued.id.as_u64(), "running main job");
        (queued.job)();
        self.executed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for MainQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MainQueue {
    fn drop(&mut self) {
        let pending = self.pending_count();
        if pending > 0 {
            crate::stack_warn!(pending, "main queue dropped with jobs still queued");
        }
        if self.affinity.is_same_thread() {
            thread_check::unregister_main_queue_thread();
        }
    }
}

impl std::fmt::Debug for MainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainQueue")
            .field("thread", &self.affinity.thread_id())
            .field("pending", &self.pending_count())
            .field("executed", &self.executed_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let queue = MainQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            queue.post(move || order.lock().push(i));
        }

        assert_eq!(queue.pending_count(), 5);
        assert_eq!(queue.run_pending(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.executed_count(), 5);
    }

    #[test]
    fn test_jobs_posted_while_draining_run_in_same_pass() {
        let queue = Arc::new(MainQueue::new());
        let hits = Arc::new(Mutex::new(Vec::new()));

        let handle = queue.handle();
        let hits_outer = hits.clone();
        queue.post(move || {
            hits_outer.lock().push("outer");
            let hits_inner = hits_outer.clone();
            handle.post(move || hits_inner.lock().push("inner"));
        });

        assert_eq!(queue.run_pending(), 2);
        assert_eq!(*hits.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_post_from_other_thread() {
        let queue = MainQueue::new();
        let handle = queue.handle();
        let ran = Arc::new(Mutex::new(false));

        let ran_clone = ran.clone();
        std::thread::spawn(move || {
            handle.post(move || *ran_clone.lock() = true);
        })
        .join()
        .unwrap();

        assert!(queue.run_next_timeout(Duration::from_millis(100)));
        assert!(*ran.lock());
    }

    #[test]
    fn test_drain_from_foreign_thread_panics() {
        let queue = Arc::new(MainQueue::new());
        let queue_clone = queue.clone();
        let result = std::thread::spawn(move || {
            queue_clone.run_pending();
        })
        .join();
        assert!(result.is_err());
    }
}
