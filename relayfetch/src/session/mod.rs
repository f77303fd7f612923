//! Download sessions.
//!
//! A [`Session`] is one single-URL download: a worker on the pool performs up
//! to `max_retries + 1` transport exchanges, aborts any attempt whose average
//! throughput falls under the watchdog threshold, applies the request's
//! transform, finalizes the session and queues the completion callback on the
//! main thread.
//!
//! # State machine
//!
//! ```text
//! Pending ──► Fetching ──┬──► Succeeded
//!               │  ▲     │
//!               └──┘     └──► Failed
//!              retry
//! ```
//!
//! Outcomes are never raised to the caller. After the callback fires, read
//! [`Session::error`] (terminal outcome) and [`Session::first_error`] (first
//! failure seen across attempts).

mod error;
mod fetcher;
mod handle;
mod request;
mod state;
mod watchdog;
mod worker;

pub use error::FetchError;
pub use fetcher::Fetcher;
pub use handle::{CompletionCallback, Session, UNKNOWN_LENGTH};
pub use request::{BoxError, Context, FetchRequest, Transform};
pub use state::SessionState;
pub use watchdog::SpeedWatchdog;
