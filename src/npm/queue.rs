//! Bounded admission queue shared by every request of one [`NpmClient`].
//!
//! At most `concurrency` tasks run at once. A task that hits a rate limit
//! calls [`RequestQueue::pause`]; while any [`PauseGuard`] is alive no new
//! task is admitted, across every search and packument fetch sharing the
//! client. Tasks already running are not interrupted.
//!
//! [`NpmClient`]: super::NpmClient

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, Semaphore, SemaphorePermit};
use tracing::debug;

use crate::error::{RegistryError, Result};

/// Semaphore-gated task admission with a pause switch.
#[derive(Debug)]
pub struct RequestQueue {
    semaphore: Semaphore,
    concurrency: usize,
    /// Number of outstanding pause guards; admission waits for zero.
    pause_depth: watch::Sender<usize>,
    /// Total pauses since construction.
    pauses: AtomicU64,
}

impl RequestQueue {
    /// Create a queue admitting at most `concurrency` tasks at a time.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (pause_depth, _) = watch::channel(0usize);
        Self {
            semaphore: Semaphore::new(concurrency),
            concurrency,
            pause_depth,
            pauses: AtomicU64::new(0),
        }
    }

    /// Run `task` once the queue admits it. The slot is held until the
    /// task completes.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.admit().await?;
        task.await
    }

    async fn admit(&self) -> Result<SemaphorePermit<'_>> {
        loop {
            let mut resumed = self.pause_depth.subscribe();
            resumed
                .wait_for(|depth| *depth == 0)
                .await
                .map_err(|_| RegistryError::Queue("pause signal dropped".to_string()))?;

            let permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| RegistryError::Queue("queue closed".to_string()))?;

            // A pause may have started while we waited for a slot.
            if !self.is_paused() {
                return Ok(permit);
            }
            debug!("Queue paused during admission, waiting again");
        }
    }

    /// Stop admitting new tasks until the returned guard is dropped.
    ///
    /// Pauses nest: the queue resumes when the last guard goes away.
    pub fn pause(&self) -> PauseGuard<'_> {
        self.pause_depth.send_modify(|depth| *depth += 1);
        self.pauses.fetch_add(1, Ordering::Relaxed);
        PauseGuard { queue: self }
    }

    fn resume(&self) {
        self.pause_depth
            .send_modify(|depth| *depth = depth.saturating_sub(1));
    }

    /// Whether admission is currently suspended.
    pub fn is_paused(&self) -> bool {
        *self.pause_depth.borrow() > 0
    }

    /// Total number of pauses since the queue was created.
    pub fn pause_count(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }

    /// Configured concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.concurrency - self.semaphore.available_permits()
    }
}

/// Keeps a [`RequestQueue`] paused while alive.
#[must_use = "the queue resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PauseGuard<'a> {
    queue: &'a RequestQueue,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.queue.resume();
    }
}
