//! The transport contract the engine executes requests through.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{CallSite, Headers, HttpMethod, Printer, TransportError};

/// A fully prepared request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Merged headers.
    pub headers: Headers,
    /// Encoded body.
    pub body: Option<Bytes>,
    /// Timeout for this request.
    pub timeout: Option<Duration>,
}

/// Status, headers and body of one attempt. Consumed by validation and
/// decoding and never kept past the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: Bytes,
}

impl RawResponse {
    /// Create a raw response.
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-call context handed to the transport.
#[derive(Clone)]
pub struct CallContext {
    /// Printer for request/response logging.
    pub printer: Arc<dyn Printer>,
    /// Where the call was issued.
    pub call_site: CallSite,
    /// Cancellation for this call.
    pub cancellation: CancellationToken,
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("call_site", &self.call_site)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// Executes a prepared request and returns the raw response.
///
/// Cancellation arrives two ways: the token in [`CallContext`] fires, and the
/// engine drops the returned future. Implementations should abort the
/// underlying network request on either and report
/// [`TransportError::Cancelled`] when they observe the token first.
/// Application-level failures (non-2xx statuses) are not errors here; they
/// are returned as a [`RawResponse`] for the validators to judge.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request.
    async fn execute(
        &self,
        request: TransportRequest,
        context: &CallContext,
    ) -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(
        &self,
        request: TransportRequest,
        context: &CallContext,
    ) -> Result<RawResponse, TransportError> {
        (**self).execute(request, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_helpers() {
        let response = RawResponse::new(201, Headers::empty(), &b"created"[..]);
        assert!(response.is_success());
        assert_eq!(response.text(), "created");

        let failed = RawResponse::new(302, Headers::empty(), Bytes::new());
        assert!(!failed.is_success());
    }
}
