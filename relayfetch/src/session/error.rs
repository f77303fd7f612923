//! Error types for download sessions.

use thiserror::Error;

use crate::transport::TransportError;

/// Failure recorded on a [`Session`](super::Session).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The exchange could not be opened.
    #[error("transport failure for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Reading the body failed.
    #[error("read from {url} failed after {received} bytes: {reason}")]
    Read {
        url: String,
        received: u64,
        reason: String,
    },

    /// The stream ended before the declared length was received.
    #[error("connection to {url} closed after {received} of {expected} bytes")]
    Truncated {
        url: String,
        received: u64,
        expected: u64,
    },

    /// The declared body length cannot be buffered.
    #[error("declared length {declared} of {url} cannot be buffered: {reason}")]
    TooLarge {
        url: String,
        declared: u64,
        reason: String,
    },

    /// The watchdog measured a throughput under the minimum.
    #[error("download speed is too slow={bytes_per_sec:.2} B/s for {url}")]
    TooSlow { url: String, bytes_per_sec: f64 },

    /// The caller's transform failed. Never retried.
    #[error("transform failed for {url}: {reason}")]
    Transform { url: String, reason: String },

    /// Every attempt failed. The source is the first failure recorded.
    #[error("retry too many times: {url} ({attempts} attempts)")]
    RetryExhausted {
        url: String,
        attempts: u32,
        #[source]
        cause: Option<Box<FetchError>>,
    },
}

impl FetchError {
    /// Whether the speed watchdog raised this failure.
    pub fn is_too_slow(&self) -> bool {
        matches!(self, Self::TooSlow { .. })
    }
}
