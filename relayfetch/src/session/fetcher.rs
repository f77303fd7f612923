//! Entry point for starting downloads and probing URLs.

use std::sync::Arc;

use tracing::debug;

use super::handle::{CompletionCallback, Session, UNKNOWN_LENGTH};
use super::request::FetchRequest;
use super::worker::Worker;
use crate::config::FetchConfig;
use crate::dispatch::Dispatcher;
use crate::transport::{Transport, TransportRequest};

/// Starts sessions on the worker pool and answers synchronous probes.
///
/// Cheap to clone; clones share the transport, dispatcher and config.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    config: Arc<FetchConfig>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, dispatcher: Dispatcher, config: FetchConfig) -> Self {
        Self {
            transport,
            dispatcher,
            config: Arc::new(config),
        }
    }

    /// Starts a download and returns its live handle.
    ///
    /// The worker is submitted immediately. `on_complete` runs once on the
    /// main thread after the session is final, unless the session is
    /// disposed first.
    pub fn start_download<F>(&self, request: FetchRequest, on_complete: F) -> Session
    where
        F: FnOnce(&Session) + Send + 'static,
    {
        self.start(request, Some(Box::new(on_complete)))
    }

    /// Starts a download without a completion callback.
    pub fn start_download_detached(&self, request: FetchRequest) -> Session {
        self.start(request, None)
    }

    fn start(&self, request: FetchRequest, callback: Option<CompletionCallback>) -> Session {
        let request = request.with_default_timeout(self.config.default_timeout);
        let session = Session::new(request.clone(), callback);

        debug!(request = %request, method = ?request.method(), "Starting download");

        let worker = Worker {
            session: session.clone(),
            request,
            transport: Arc::clone(&self.transport),
            dispatcher: self.dispatcher.clone(),
            config: Arc::clone(&self.config),
        };
        self.dispatcher.pool().spawn(move || worker.run());

        session
    }

    /// HEAD probe: `true` only when the server answers 200.
    ///
    /// Blocks the calling thread for up to the probe timeout.
    pub fn is_exist(&self, url: &str) -> bool {
        let request = TransportRequest::head(url, self.config.probe_timeout);
        match self.transport.open(&request) {
            Ok(response) => response.status() == 200,
            Err(e) => {
                debug!(url = %url, error = %e, "Existence probe failed");
                false
            }
        }
    }

    /// GET probe returning the declared body length.
    ///
    /// Returns [`UNKNOWN_LENGTH`] for a non-200 status, a missing length or
    /// any failure. Only headers are read.
    pub fn content_length(&self, url: &str) -> i64 {
        let request = TransportRequest::get(url, self.config.probe_timeout);
        match self.transport.open(&request) {
            Ok(response) if response.status() == 200 => response
                .content_length()
                .and_then(|len| i64::try_from(len).ok())
                .unwrap_or(UNKNOWN_LENGTH),
            Ok(response) => {
                debug!(url = %url, status = response.status(), "Length probe got non-200 status");
                UNKNOWN_LENGTH
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Length probe failed");
                UNKNOWN_LENGTH
            }
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchQueue, WorkerPool};
    use crate::transport::{Method, TransportError, TransportResponse};
    use parking_lot::Mutex;
    use std::io::{self, Read};

    struct StaticResponse {
        status: u16,
        length: Option<u64>,
    }

    impl Read for StaticResponse {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl TransportResponse for StaticResponse {
        fn status(&self) -> u16 {
            self.status
        }

        fn content_length(&self) -> Option<u64> {
            self.length
        }
    }

    /// Answers every request with a fixed status and length.
    struct MockTransport {
        reply: Result<(u16, Option<u64>), TransportError>,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl MockTransport {
        fn replying(status: u16, length: Option<u64>) -> Self {
            Self {
                reply: Ok((status, length)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(TransportError::Request {
                    url: "http://x".to_string(),
                    reason: "connection refused".to_string(),
                }),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for MockTransport {
        fn open(
            &self,
            request: &TransportRequest,
        ) -> Result<Box<dyn TransportResponse>, TransportError> {
            self.seen.lock().push(request.clone());
            let (status, length) = self.reply.clone()?;
            Ok(Box::new(StaticResponse { status, length }))
        }
    }

    fn fetcher(transport: Arc<MockTransport>) -> Fetcher {
        let pool = Arc::new(WorkerPool::new(1).unwrap());
        let (dispatcher, _drain) = DispatchQueue::new(pool);
        let config = FetchConfig::default().with_probe_timeout(std::time::Duration::from_millis(750));
        Fetcher::new(transport, dispatcher, config)
    }

    #[test]
    fn test_is_exist_uses_head_with_probe_timeout() {
        let transport = Arc::new(MockTransport::replying(200, None));
        let fetcher = fetcher(Arc::clone(&transport));

        assert!(fetcher.is_exist("http://x/file"));
        let seen = transport.seen.lock();
        assert_eq!(seen[0].method, Method::Head);
        assert_eq!(seen[0].timeout.as_millis(), 750);
    }

    #[test]
    fn test_is_exist_false_for_other_status() {
        let fetcher = fetcher(Arc::new(MockTransport::replying(204, None)));
        assert!(!fetcher.is_exist("http://x/file"));
    }

    #[test]
    fn test_is_exist_false_on_failure() {
        let fetcher = fetcher(Arc::new(MockTransport::failing()));
        assert!(!fetcher.is_exist("http://x/file"));
    }

    #[test]
    fn test_content_length_on_200() {
        let transport = Arc::new(MockTransport::replying(200, Some(12345)));
        let fetcher = fetcher(Arc::clone(&transport));

        assert_eq!(fetcher.content_length("http://x/file"), 12345);
        assert_eq!(transport.seen.lock()[0].method, Method::Get);
    }

    #[test]
    fn test_content_length_unknown_cases() {
        assert_eq!(
            fetcher(Arc::new(MockTransport::replying(404, Some(10)))).content_length("http://x"),
            UNKNOWN_LENGTH
        );
        assert_eq!(
            fetcher(Arc::new(MockTransport::replying(200, None))).content_length("http://x"),
            UNKNOWN_LENGTH
        );
        assert_eq!(
            fetcher(Arc::new(MockTransport::failing())).content_length("http://x"),
            UNKNOWN_LENGTH
        );
    }
}
