//! Bounded background worker pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::invoke::panic_message;

/// Errors raised while building the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Fixed-size thread pool for session workers and `run_async` jobs.
///
/// Jobs beyond the thread count wait in the pool's queue, so the number of
/// concurrent blocking transfers never exceeds `threads()`.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
    panics: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Creates a pool with `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        let threads = threads.max(1);
        let panics = Arc::new(AtomicU64::new(0));
        let panic_counter = Arc::clone(&panics);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("relayfetch-worker-{}", index))
            .panic_handler(move |payload| {
                panic_counter.fetch_add(1, Ordering::Relaxed);
                error!(panic = %panic_message(payload.as_ref()), "Worker job panicked");
            })
            .build()?;

        Ok(Self {
            pool,
            threads,
            panics,
        })
    }

    /// Queues a job on the pool.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Jobs that escaped with a panic.
    pub fn panic_count(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("panics", &self.panic_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_pool_runs_jobs() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..4 {
            let tx = tx.clone();
            pool.spawn(move || tx.send(i).unwrap());
        }

        let mut seen: Vec<i32> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_pool_minimum_one_thread() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.threads(), 1);
    }

    #[test]
    fn test_pool_survives_panicking_job() {
        let pool = WorkerPool::new(1).unwrap();
        pool.spawn(|| panic!("job failed"));

        let (tx, rx) = mpsc::channel();
        pool.spawn(move || tx.send(()).unwrap());
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(pool.panic_count(), 1);
    }
}
