//! Dispatch queue with a single main-thread consumer.
//!
//! Producers append to the `incoming` vector under a short lock. On each
//! tick the drain swaps `incoming` with its private `draining` vector and
//! runs the callbacks with the lock released, so callbacks may enqueue more
//! work. Anything enqueued during a tick lands in the fresh `incoming`
//! vector and runs on the next tick.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use super::pool::WorkerPool;
use crate::invoke;

/// A queued zero-argument callback.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    incoming: Mutex<Vec<Callback>>,
}

/// Constructor for a producer/consumer pair.
pub struct DispatchQueue;

impl DispatchQueue {
    /// Creates a queue, returning the producer handle and the drain.
    ///
    /// The drain must be created on (and stays on) the thread that will tick
    /// it. `pool` runs [`Dispatcher::run_async`] jobs.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(pool: Arc<WorkerPool>) -> (Dispatcher, MainThreadDrain) {
        let shared = Arc::new(Shared {
            incoming: Mutex::new(Vec::new()),
        });

        let dispatcher = Dispatcher {
            shared: Arc::clone(&shared),
            pool,
        };
        let drain = MainThreadDrain {
            shared,
            draining: Vec::new(),
            _not_send: PhantomData,
        };

        (dispatcher, drain)
    }
}

/// Producer handle. Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    pool: Arc<WorkerPool>,
}

impl Dispatcher {
    /// Queues `callback` for the next tick on the main thread.
    pub fn enqueue<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.incoming.lock().push(Box::new(callback));
    }

    /// Queues an optional callback; `None` is ignored.
    pub fn enqueue_opt(&self, callback: Option<Callback>) {
        if let Some(callback) = callback {
            self.shared.incoming.lock().push(callback);
        }
    }

    /// Runs `callback` once on the worker pool, outside the drain cycle.
    ///
    /// A panic is caught and logged.
    pub fn run_async<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(move || {
            invoke::guarded("run_async", callback);
        });
    }

    /// Callbacks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.shared.incoming.lock().len()
    }

    pub(crate) fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending())
            .field("pool", &self.pool)
            .finish()
    }
}

/// The single consumer of a dispatch queue.
///
/// `!Send` and `!Sync`: it never leaves the thread that created it, which
/// makes that thread the main thread.
pub struct MainThreadDrain {
    shared: Arc<Shared>,
    draining: Vec<Callback>,
    _not_send: PhantomData<*const ()>,
}

impl MainThreadDrain {
    /// Runs every callback queued before this call, in enqueue order.
    ///
    /// Returns the number of callbacks executed. A panicking callback is
    /// logged and the remaining ones still run.
    pub fn tick(&mut self) -> usize {
        {
            let mut incoming = self.shared.incoming.lock();
            if incoming.is_empty() {
                return 0;
            }
            std::mem::swap(&mut *incoming, &mut self.draining);
        }

        let count = self.draining.len();
        for callback in self.draining.drain(..) {
            invoke::guarded("dispatch tick", callback);
        }
        count
    }

    /// Callbacks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.shared.incoming.lock().len()
    }
}

impl std::fmt::Debug for MainThreadDrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadDrain")
            .field("pending", &self.pending())
            .finish()
    }
}
