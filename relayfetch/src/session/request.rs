//! Request descriptor.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::config::DEFAULT_TIMEOUT_MS;
use crate::transport::{Method, TransportRequest};

/// Opaque caller value handed back to the transform.
pub type Context = Arc<dyn Any + Send + Sync>;

/// Error type returned by transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Post-processing applied to a fully received body on the worker thread.
pub type Transform =
    Arc<dyn Fn(&[u8], Option<&Context>) -> Result<Vec<u8>, BoxError> + Send + Sync>;

/// Describes one download.
///
/// Built with chained `with_*` calls and then handed to
/// [`Fetcher::start_download`](crate::Fetcher::start_download). The POST body
/// is copied when set, so the caller's buffer may change afterwards.
#[derive(Clone)]
pub struct FetchRequest {
    url: String,
    timeout: Option<Duration>,
    context: Option<Context>,
    post_body: Option<Bytes>,
    transform: Option<Transform>,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            context: None,
            post_body: None,
            transform: None,
        }
    }

    /// Sets the timeout in milliseconds; non-positive values select the default.
    pub fn with_timeout_ms(mut self, millis: i64) -> Self {
        self.timeout = u64::try_from(millis)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        self
    }

    /// Sets the timeout; zero selects the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// Attaches an opaque caller value.
    pub fn with_context<T: Any + Send + Sync>(mut self, context: T) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    /// Attaches an already shared caller value.
    pub fn with_shared_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Switches the request to POST with a copy of `body`.
    ///
    /// An empty body is ignored and the request stays a GET.
    pub fn with_post_body(mut self, body: &[u8]) -> Self {
        if !body.is_empty() {
            self.post_body = Some(Bytes::copy_from_slice(body));
        }
        self
    }

    /// Sets the post-processing transform.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&[u8], Option<&Context>) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Sets an already shared transform.
    pub fn with_shared_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Effective timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout().as_millis() as u64
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn post_body(&self) -> Option<&[u8]> {
        self.post_body.as_deref()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub fn method(&self) -> Method {
        if self.post_body.is_some() {
            Method::Post
        } else {
            Method::Get
        }
    }

    /// Fills an unset timeout with `default`.
    pub(crate) fn with_default_timeout(mut self, default: Duration) -> Self {
        if self.timeout.is_none() && !default.is_zero() {
            self.timeout = Some(default);
        }
        self
    }

    /// Copy without the transform and POST body.
    pub(crate) fn released(&self) -> Self {
        Self {
            url: self.url.clone(),
            timeout: self.timeout,
            context: self.context.clone(),
            post_body: None,
            transform: None,
        }
    }

    pub(crate) fn to_transport(&self) -> TransportRequest {
        match &self.post_body {
            Some(body) => TransportRequest::post(&self.url, body.clone(), self.timeout()),
            None => TransportRequest::get(&self.url, self.timeout()),
        }
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[url={}, timeout={}, context={}]",
            self.url,
            self.timeout_ms(),
            if self.context.is_some() { "(set)" } else { "(null)" }
        )
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("url", &self.url)
            .field("timeout", &self.timeout())
            .field("has_context", &self.context.is_some())
            .field("post_body_len", &self.post_body.as_ref().map(|b| b.len()))
            .field("has_transform", &self.transform.is_some())
            .finish()
    }
}
