//! Shared session handle.
//!
//! Every field is readable from any thread. Scalars are atomics; buffers and
//! errors sit behind short-held `parking_lot` locks, so readers see either the
//! old or the new value of a field, never a torn one. The `state` lock
//! serializes finalization against disposal.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::FetchError;
use super::request::FetchRequest;
use super::state::SessionState;
use crate::invoke::CallbackSlot;

/// Sentinel stored while the total length is unknown.
pub const UNKNOWN_LENGTH: i64 = -1;

/// Completion callback, invoked at most once on the main thread.
pub type CompletionCallback = Box<dyn FnOnce(&Session) + Send + 'static>;

/// Terminal result handed from the worker to [`Session::complete`].
pub(crate) enum Outcome {
    Succeeded(Bytes),
    Failed(FetchError),
    Cancelled,
}

struct Inner {
    url: String,
    request: Mutex<FetchRequest>,
    bytes: RwLock<Bytes>,
    error: Mutex<Option<FetchError>>,
    first_error: Mutex<Option<FetchError>>,
    state: Mutex<SessionState>,
    callback: Mutex<CallbackSlot<CompletionCallback>>,
    done: AtomicBool,
    progress: AtomicU32,
    total_length: AtomicI64,
    disposed: AtomicBool,
    cancel: CancellationToken,
}

/// Handle to one download. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub(crate) fn new(request: FetchRequest, callback: Option<CompletionCallback>) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: request.url().to_string(),
                request: Mutex::new(request),
                bytes: RwLock::new(Bytes::new()),
                error: Mutex::new(None),
                first_error: Mutex::new(None),
                state: Mutex::new(SessionState::Pending),
                callback: Mutex::new(CallbackSlot::new(callback)),
                done: AtomicBool::new(false),
                progress: AtomicU32::new(0f32.to_bits()),
                total_length: AtomicI64::new(UNKNOWN_LENGTH),
                disposed: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Target URL, kept after disposal.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Snapshot of the current descriptor.
    ///
    /// After completion the transform and POST body are gone; after disposal
    /// this is an empty request.
    pub fn request(&self) -> FetchRequest {
        self.inner.request.lock().clone()
    }

    /// Result buffer. Empty until success, and after failure or disposal.
    pub fn bytes(&self) -> Bytes {
        self.inner.bytes.read().clone()
    }

    /// Error reported to the caller.
    ///
    /// Holds the first attempt failure, even after a later attempt succeeds.
    /// Replaced by `RetryExhausted` once every attempt failed. `None` only
    /// when no attempt failed.
    pub fn error(&self) -> Option<FetchError> {
        self.inner.error.lock().clone()
    }

    /// First failure recorded across attempts.
    ///
    /// Stays set when a later attempt succeeds.
    pub fn first_error(&self) -> Option<FetchError> {
        self.inner.first_error.lock().clone()
    }

    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// Progress in `[0, 1]`; `1.0` once done.
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.inner.progress.load(Ordering::Acquire))
    }

    /// Declared length of the last response, if any.
    pub fn total_length(&self) -> Option<u64> {
        u64::try_from(self.inner.total_length.load(Ordering::Acquire)).ok()
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Releases the session.
    ///
    /// Idempotent and non-blocking. Drops a callback that has not been handed
    /// to the dispatch queue yet, empties the buffer, clears errors and the
    /// descriptor, and cancels the worker at its next check. A callback that
    /// was already queued is still delivered.
    pub fn dispose(&self) {
        let _state = self.inner.state.lock();
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.cancel.cancel();
        self.inner.callback.lock().release();
        *self.inner.bytes.write() = Bytes::new();
        *self.inner.request.lock() = FetchRequest::default();
        *self.inner.error.lock() = None;
        *self.inner.first_error.lock() = None;

        debug!(url = %self.inner.url, "Session disposed");
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Moves `Pending` to `Fetching`; false if the session was disposed.
    pub(crate) fn begin(&self) -> bool {
        let mut state = self.inner.state.lock();
        if self.is_disposed() {
            return false;
        }
        if *state == SessionState::Pending {
            *state = SessionState::Fetching;
        }
        true
    }

    /// Raises progress; lower values are ignored.
    pub(crate) fn advance_progress(&self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        let _ = self
            .inner
            .progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (value > f32::from_bits(bits)).then_some(value.to_bits())
            });
    }

    pub(crate) fn set_total_length(&self, length: Option<u64>) {
        let raw = length
            .and_then(|l| i64::try_from(l).ok())
            .unwrap_or(UNKNOWN_LENGTH);
        self.inner.total_length.store(raw, Ordering::Release);
    }

    /// Records an attempt failure, keeping only the first one.
    pub(crate) fn record_failure(&self, error: FetchError) {
        let _state = self.inner.state.lock();
        if self.is_disposed() {
            return;
        }
        let mut current = self.inner.error.lock();
        if current.is_none() {
            *current = Some(error.clone());
        }
        let mut first = self.inner.first_error.lock();
        if first.is_none() {
            *first = Some(error);
        }
    }

    /// Finalizes the session exactly once.
    ///
    /// Returns the callback to deliver, if one is still armed.
    pub(crate) fn complete(&self, outcome: Outcome) -> Option<CompletionCallback> {
        let mut state = self.inner.state.lock();
        if state.is_terminal() {
            return None;
        }

        let disposed = self.is_disposed();
        *state = match (&outcome, disposed) {
            (Outcome::Succeeded(_), false) => SessionState::Succeeded,
            _ => SessionState::Failed,
        };

        if !disposed {
            match outcome {
                Outcome::Succeeded(bytes) => {
                    *self.inner.bytes.write() = bytes;
                }
                Outcome::Failed(error) => {
                    *self.inner.bytes.write() = Bytes::new();
                    let mut current = self.inner.error.lock();
                    if current.is_none() || matches!(error, FetchError::RetryExhausted { .. }) {
                        *current = Some(error);
                    }
                }
                Outcome::Cancelled => {}
            }

            let mut request = self.inner.request.lock();
            *request = request.released();
        }

        self.inner.done.store(true, Ordering::Release);
        self.inner
            .progress
            .store(1f32.to_bits(), Ordering::Release);

        self.inner.callback.lock().take()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Session: url={}, done={}, progress={}, error={}]",
            self.url(),
            self.is_done(),
            self.progress(),
            self.error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "(none)".to_string())
        )
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .field("progress", &self.progress())
            .field("bytes", &self.inner.bytes.read().len())
            .field("error", &self.error())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn session_with_counter() -> (Session, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let session = Session::new(
            FetchRequest::new("http://example.com/a").with_post_body(b"x=1"),
            Some(Box::new(move |_s: &Session| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        (session, calls)
    }

    #[test]
    fn test_new_session_defaults() {
        let (session, _) = session_with_counter();
        assert_eq!(session.state(), SessionState::Pending);
        assert!(session.bytes().is_empty());
        assert_eq!(session.progress(), 0.0);
        assert_eq!(session.total_length(), None);
        assert!(!session.is_done());
        assert!(session.error().is_none());
    }

    #[test]
    fn test_progress_never_decreases() {
        let (session, _) = session_with_counter();
        session.advance_progress(0.5);
        session.advance_progress(0.2);
        assert_eq!(session.progress(), 0.5);
        session.advance_progress(2.0);
        assert_eq!(session.progress(), 1.0);
    }

    #[test]
    fn test_total_length_sentinel() {
        let (session, _) = session_with_counter();
        session.set_total_length(Some(12345));
        assert_eq!(session.total_length(), Some(12345));
        session.set_total_length(None);
        assert_eq!(session.total_length(), None);
    }

    #[test]
    fn test_first_failure_is_kept() {
        let (session, _) = session_with_counter();
        session.record_failure(FetchError::HttpStatus {
            url: "u".into(),
            status: 500,
        });
        session.record_failure(FetchError::HttpStatus {
            url: "u".into(),
            status: 502,
        });
        assert!(matches!(
            session.first_error(),
            Some(FetchError::HttpStatus { status: 500, .. })
        ));
    }

    #[test]
    fn test_failure_before_success_keeps_error() {
        let (session, _) = session_with_counter();
        session.begin();
        session.record_failure(FetchError::HttpStatus {
            url: "u".into(),
            status: 503,
        });
        session.complete(Outcome::Succeeded(Bytes::from_static(b"body")));

        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(&session.bytes()[..], b"body");
        assert!(matches!(
            session.error(),
            Some(FetchError::HttpStatus { status: 503, .. })
        ));
    }

    #[test]
    fn test_exhaustion_replaces_attempt_error() {
        let (session, _) = session_with_counter();
        session.begin();
        let cause = FetchError::HttpStatus {
            url: "u".into(),
            status: 500,
        };
        session.record_failure(cause.clone());
        session.complete(Outcome::Failed(FetchError::RetryExhausted {
            url: "u".into(),
            attempts: 2,
            cause: Some(Box::new(cause)),
        }));

        assert!(matches!(
            session.error(),
            Some(FetchError::RetryExhausted { .. })
        ));
        assert!(session.bytes().is_empty());
    }

    #[test]
    fn test_complete_success_sets_final_state_once() {
        let (session, calls) = session_with_counter();
        assert!(session.begin());

        let callback = session.complete(Outcome::Succeeded(Bytes::from_static(b"body")));
        assert!(callback.is_some());
        assert_eq!(session.state(), SessionState::Succeeded);
        assert_eq!(&session.bytes()[..], b"body");
        assert_eq!(session.progress(), 1.0);
        assert!(session.is_done());
        assert!(session.request().post_body().is_none());

        // Second finalization is ignored
        assert!(session.complete(Outcome::Cancelled).is_none());
        callback.unwrap()(&session);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_before_complete_suppresses_callback() {
        let (session, _) = session_with_counter();
        session.begin();
        session.dispose();
        session.dispose();

        assert!(session.cancellation().is_cancelled());
        assert!(!session.begin());
        let callback = session.complete(Outcome::Succeeded(Bytes::from_static(b"late")));
        assert!(callback.is_none());
        assert!(session.bytes().is_empty());
        assert!(session.error().is_none());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.url(), "http://example.com/a");
        assert_eq!(session.request().url(), "");
    }

    #[test]
    fn test_dispose_after_complete_keeps_taken_callback() {
        let (session, calls) = session_with_counter();
        session.begin();
        let callback = session.complete(Outcome::Succeeded(Bytes::from_static(b"body")));
        session.dispose();

        assert!(session.bytes().is_empty());
        callback.unwrap()(&session);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_display() {
        let (session, _) = session_with_counter();
        assert_eq!(
            session.to_string(),
            "[Session: url=http://example.com/a, done=false, progress=0, error=(none)]"
        );
    }
}
