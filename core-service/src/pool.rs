//! # Worker Pool
//!
//! Semaphore-bounded concurrency for per-file and per-group units of
//! work. The pool size is the only concurrency-affecting knob: a slow
//! unit never stalls siblings beyond slot contention.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounded pool of work slots.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    /// A pool with at least one slot.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run one unit of work inside a pool slot.
    pub async fn run<Fut: Future>(&self, work: Fut) -> Fut::Output {
        // Acquisition only fails when the semaphore is closed, which the
        // pool never does; fall through unthrottled in that case.
        let _permit = self.semaphore.acquire().await.ok();
        work.await
    }
}
