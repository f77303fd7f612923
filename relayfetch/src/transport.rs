//! HTTP transport abstraction for testability
//!
//! The session worker only needs one blocking request/response exchange at a
//! time: send a request, look at the status and declared length, then read the
//! body incrementally. [`Transport`] captures exactly that so the retry loop
//! can be driven by [`ReqwestTransport`] in production and by scripted
//! transports in tests.

use std::io::{self, Read};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use thiserror::Error;

/// Content type sent with POST bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP method of a transport request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
}

/// Errors raised while opening an exchange.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The underlying HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The request could not be sent or no response headers arrived.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request exceeded its timeout.
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
}

/// One request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub user_agent: &'static str,
}

impl TransportRequest {
    /// A GET request.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            body: None,
            timeout,
            user_agent: user_agent(),
        }
    }

    /// A HEAD request.
    pub fn head(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Head,
            ..Self::get(url, timeout)
        }
    }

    /// A form-encoded POST request.
    pub fn post(url: impl Into<String>, body: Bytes, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(url, timeout)
        }
    }

    /// Content type header for this request, if it carries a body.
    pub fn content_type(&self) -> Option<&'static str> {
        self.body.as_ref().map(|_| FORM_CONTENT_TYPE)
    }
}

/// An open response. Dropping it closes the exchange.
pub trait TransportResponse: Read + Send {
    /// HTTP status code.
    fn status(&self) -> u16;

    /// Declared body length, `None` when the server did not announce one.
    fn content_length(&self) -> Option<u64>;
}

/// Trait for blocking HTTP exchanges.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling scripted transports in tests.
pub trait Transport: Send + Sync {
    /// Sends the request and returns once response headers are available.
    fn open(&self, request: &TransportRequest) -> Result<Box<dyn TransportResponse>, TransportError>;
}

/// Returns the User-Agent string for the current platform.
pub fn user_agent() -> &'static str {
    if cfg!(target_os = "android") {
        "Mozilla/5.0 (Linux; Android 5.0; SM-G900P Build/LRX21T) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/48.0.2564.23 Mobile Safari/537.36"
    } else if cfg!(target_os = "ios") {
        "Mozilla/5.0 (iPhone; CPU iPhone OS 9_1 like Mac OS X) AppleWebKit/601.1.46 (KHTML, like Gecko) Version/9.0 Mobile/13B143 Safari/601.1"
    } else {
        "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/53.0.2785.116 Safari/537.36"
    }
}

/// Real transport implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Creates a new transport.
    ///
    /// Proxies are disabled; timeouts are applied per request.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn open(&self, request: &TransportRequest) -> Result<Box<dyn TransportResponse>, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Head => self.client.head(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        let mut builder = builder
            .timeout(request.timeout)
            .header(USER_AGENT, request.user_agent);

        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(body.to_vec());
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: request.url.clone(),
                    timeout_ms: request.timeout.as_millis() as u64,
                }
            } else {
                TransportError::Request {
                    url: request.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(Box::new(ReqwestResponse { inner: response }))
    }
}

struct ReqwestResponse {
    inner: reqwest::blocking::Response,
}

impl Read for ReqwestResponse {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl TransportResponse for ReqwestResponse {
    fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_request() {
        let request = TransportRequest::get("http://example.com/a", Duration::from_secs(3));
        assert_eq!(request.method, Method::Get);
        assert!(request.body.is_none());
        assert!(request.content_type().is_none());
        assert_eq!(request.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_head_request() {
        let request = TransportRequest::head("http://example.com/a", Duration::from_secs(1));
        assert_eq!(request.method, Method::Head);
        assert_eq!(request.url, "http://example.com/a");
    }

    #[test]
    fn test_post_request_sets_form_content_type() {
        let request = TransportRequest::post(
            "http://example.com/a",
            Bytes::from_static(b"k=v"),
            Duration::from_secs(1),
        );
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body.as_deref(), Some(&b"k=v"[..]));
        assert_eq!(request.content_type(), Some(FORM_CONTENT_TYPE));
    }

    #[test]
    fn test_user_agent_is_not_empty() {
        assert!(user_agent().starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_reqwest_transport_new() {
        assert!(ReqwestTransport::new().is_ok());
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout {
            url: "http://example.com".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(err.to_string(), "request to http://example.com timed out after 500ms");
    }
}
