//! Main-thread marshaling.
//!
//! Work produced on background threads (completion callbacks, log lines) is
//! handed to the one thread that owns the host application's update loop.
//!
//! # Architecture
//!
//! ```text
//! worker threads ──► Dispatcher::enqueue ──► incoming (Mutex<Vec>)
//!                                                  │ swap on tick
//!                                                  ▼
//! main thread ◄──── MainThreadDrain::tick ◄── draining (private Vec)
//!
//! any thread ──► Dispatcher::run_async ──► WorkerPool
//! ```
//!
//! [`DispatchQueue::new`] returns a cloneable [`Dispatcher`] for producers and
//! exactly one [`MainThreadDrain`]. The drain is `!Send`, so it can only be
//! ticked by the thread that created it.

mod pool;
mod queue;

pub use pool::{PoolError, WorkerPool};
pub use queue::{Callback, DispatchQueue, Dispatcher, MainThreadDrain};
