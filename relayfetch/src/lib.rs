//! relayfetch - background HTTP fetches delivered on the main thread
//!
//! This library downloads a single resource per [`Session`] on a bounded
//! worker pool, retries a failed exchange once, aborts transfers that stall
//! below a minimum throughput, applies an optional caller transform off the
//! main thread, and hands the completion callback to a [`Dispatcher`] whose
//! [`MainThreadDrain`] runs it on the host application's update loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Fetcher                                │
//! │                                                                   │
//! │  start_download ──► WorkerPool ──► retry loop ──► Transport       │
//! │                                        │                          │
//! │                                        ├── SpeedWatchdog          │
//! │                                        ├── Transform              │
//! │                                        ▼                          │
//! │                                    finalize                       │
//! │                                        │                          │
//! │                                        ▼                          │
//! │  Dispatcher::enqueue ──► incoming ──► MainThreadDrain::tick       │
//! │                                        (main thread only)         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use relayfetch::{DispatchQueue, FetchConfig, FetchRequest, Fetcher, ReqwestTransport, WorkerPool};
//!
//! let config = FetchConfig::default();
//! let pool = Arc::new(WorkerPool::new(config.worker_threads)?);
//! let (dispatcher, mut drain) = DispatchQueue::new(pool);
//! let fetcher = Fetcher::new(Arc::new(ReqwestTransport::new()?), dispatcher, config);
//!
//! let session = fetcher.start_download(FetchRequest::new("http://example.com/a.bin"), |s| {
//!     println!("done: {} bytes, error={:?}", s.bytes().len(), s.error());
//! });
//!
//! // Host update loop
//! while !session.is_done() || drain.pending() > 0 {
//!     drain.tick();
//!     std::thread::sleep(std::time::Duration::from_millis(16));
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod invoke;
pub mod logging;
pub mod session;
pub mod transforms;
pub mod transport;

pub use config::{ConfigError, FetchConfig};
pub use dispatch::{Callback, DispatchQueue, Dispatcher, MainThreadDrain, PoolError, WorkerPool};
pub use logging::{LogSink, MainThreadLogLayer};
pub use session::{
    BoxError, Context, FetchError, FetchRequest, Fetcher, Session, SessionState, SpeedWatchdog,
    Transform, UNKNOWN_LENGTH,
};
pub use transport::{
    Method, ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
