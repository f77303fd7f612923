//! Retry loop run on the worker pool for each session.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::error::FetchError;
use super::handle::{Outcome, Session};
use super::request::FetchRequest;
use super::watchdog::SpeedWatchdog;
use crate::config::FetchConfig;
use crate::dispatch::Dispatcher;
use crate::invoke;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Why an attempt stopped without a body.
enum Abort {
    Cancelled,
    Failed(FetchError),
}

impl From<FetchError> for Abort {
    fn from(error: FetchError) -> Self {
        Self::Failed(error)
    }
}

/// Everything one session's worker needs, moved onto the pool.
pub(crate) struct Worker {
    pub(crate) session: Session,
    pub(crate) request: FetchRequest,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) config: Arc<FetchConfig>,
}

impl Worker {
    /// Runs attempts until success, exhaustion or cancellation, then
    /// finalizes the session and queues its callback.
    pub(crate) fn run(self) {
        let outcome = if self.session.begin() {
            self.fetch()
        } else {
            Outcome::Cancelled
        };

        if let Some(callback) = self.session.complete(outcome) {
            let session = self.session.clone();
            self.dispatcher.enqueue(move || {
                invoke::guarded("session completion", || callback(&session));
            });
        }
    }

    fn fetch(&self) -> Outcome {
        let url = self.request.url();
        let transport_request = self.request.to_transport();
        let watchdog = SpeedWatchdog::from_config(&self.config);
        let max_attempts = self.config.max_attempts();
        let mut buffer = Vec::new();

        for attempt in 1..=max_attempts {
            if self.session.cancellation().is_cancelled() {
                return Outcome::Cancelled;
            }
            if attempt > 1 {
                info!(
                    url = %url,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    "Retry download"
                );
            }

            match self.attempt(&transport_request, &watchdog, &mut buffer) {
                Ok(()) => {
                    debug!(
                        url = %url,
                        attempt = attempt,
                        bytes = buffer.len(),
                        "Download complete"
                    );
                    return match self.apply_transform(std::mem::take(&mut buffer)) {
                        Ok(body) => Outcome::Succeeded(body),
                        Err(error) => {
                            warn!(url = %url, error = %error, "Transform failed");
                            Outcome::Failed(error)
                        }
                    };
                }
                Err(Abort::Cancelled) => return Outcome::Cancelled,
                Err(Abort::Failed(error)) => {
                    warn!(
                        url = %url,
                        attempt = attempt,
                        error = %error,
                        too_slow = error.is_too_slow(),
                        "Download attempt failed"
                    );
                    self.session.record_failure(error);
                }
            }
        }

        let error = FetchError::RetryExhausted {
            url: url.to_string(),
            attempts: max_attempts,
            cause: self.session.first_error().map(Box::new),
        };
        warn!(url = %url, attempts = max_attempts, "Retry too many times");
        Outcome::Failed(error)
    }

    /// One exchange. On success `buffer` holds exactly the received body.
    fn attempt(
        &self,
        request: &TransportRequest,
        watchdog: &SpeedWatchdog,
        buffer: &mut Vec<u8>,
    ) -> Result<(), Abort> {
        let url = &request.url;
        let started = Instant::now();

        let mut response = self
            .transport
            .open(request)
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(FetchError::HttpStatus {
                url: url.clone(),
                status,
            }
            .into());
        }

        let declared = response.content_length();
        self.session.set_total_length(declared);

        match declared {
            Some(expected) => {
                self.read_exact_len(response.as_mut(), url, expected, started, watchdog, buffer)
            }
            None => self.read_to_end(response.as_mut(), url, started, watchdog, buffer),
        }
    }

    fn read_exact_len(
        &self,
        response: &mut dyn TransportResponse,
        url: &str,
        expected: u64,
        started: Instant,
        watchdog: &SpeedWatchdog,
        buffer: &mut Vec<u8>,
    ) -> Result<(), Abort> {
        let too_large = |reason: String| FetchError::TooLarge {
            url: url.to_string(),
            declared: expected,
            reason,
        };
        let len = usize::try_from(expected)
            .map_err(|_| too_large("exceeds the address space".to_string()))?;
        if buffer.len() != len {
            buffer.clear();
            buffer
                .try_reserve_exact(len)
                .map_err(|e| too_large(e.to_string()))?;
            buffer.resize(len, 0);
        }

        let chunk = self.config.read_chunk_size.max(1);
        let mut received = 0usize;

        while received < len {
            if self.session.cancellation().is_cancelled() {
                return Err(Abort::Cancelled);
            }

            let end = received.saturating_add(chunk).min(len);
            let n = match response.read(&mut buffer[received..end]) {
                Ok(0) => {
                    return Err(FetchError::Truncated {
                        url: url.to_string(),
                        received: received as u64,
                        expected,
                    }
                    .into())
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_error(url, received, e).into()),
            };

            received += n;
            self.session.advance_progress(received as f32 / len as f32);

            if received == len {
                break;
            }
            check_speed(watchdog, url, received, started)?;
        }

        Ok(())
    }

    fn read_to_end(
        &self,
        response: &mut dyn TransportResponse,
        url: &str,
        started: Instant,
        watchdog: &SpeedWatchdog,
        buffer: &mut Vec<u8>,
    ) -> Result<(), Abort> {
        buffer.clear();
        let mut chunk = vec![0u8; self.config.read_chunk_size.max(1)];

        loop {
            if self.session.cancellation().is_cancelled() {
                return Err(Abort::Cancelled);
            }

            match response.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_error(url, buffer.len(), e).into()),
            }

            check_speed(watchdog, url, buffer.len(), started)?;
        }
    }

    fn apply_transform(&self, body: Vec<u8>) -> Result<Bytes, FetchError> {
        let Some(transform) = self.request.transform() else {
            return Ok(Bytes::from(body));
        };

        let context = self.request.context();
        match panic::catch_unwind(AssertUnwindSafe(|| transform(&body, context))) {
            Ok(Ok(output)) => Ok(Bytes::from(output)),
            Ok(Err(e)) => Err(FetchError::Transform {
                url: self.request.url().to_string(),
                reason: e.to_string(),
            }),
            Err(payload) => Err(FetchError::Transform {
                url: self.request.url().to_string(),
                reason: format!("panicked: {}", invoke::panic_message(payload.as_ref())),
            }),
        }
    }
}

fn check_speed(
    watchdog: &SpeedWatchdog,
    url: &str,
    received: usize,
    started: Instant,
) -> Result<(), FetchError> {
    match watchdog.check(received as u64, started.elapsed()) {
        Some(bytes_per_sec) => Err(FetchError::TooSlow {
            url: url.to_string(),
            bytes_per_sec,
        }),
        None => Ok(()),
    }
}

fn read_error(url: &str, received: usize, error: io::Error) -> FetchError {
    FetchError::Read {
        url: url.to_string(),
        received: received as u64,
        reason: error.to_string(),
    }
}
