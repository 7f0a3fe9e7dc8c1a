//! Error types for operation execution.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::{CallSite, Headers};

/// Boxed error used where middleware may fail with anything.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for engine entry points.
pub type Result<T> = std::result::Result<T, Exception>;

/// Errors raised by the standard status-code validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HttpStatusError {
    /// 4xx response.
    #[error("Client error: HTTP {code}")]
    Client {
        /// HTTP status code.
        code: u16,
    },

    /// 5xx response.
    #[error("Server error: HTTP {code}")]
    Server {
        /// HTTP status code.
        code: u16,
    },

    /// Any status outside 100-299, 4xx and 5xx.
    #[error("Unknown response code: HTTP {code}")]
    UnknownCode {
        /// HTTP status code.
        code: u16,
    },
}

impl HttpStatusError {
    /// Classify a status code. `Ok` for 100-299.
    pub fn check(code: u16) -> std::result::Result<(), Self> {
        match code {
            100..=299 => Ok(()),
            400..=499 => Err(Self::Client { code }),
            500..=599 => Err(Self::Server { code }),
            _ => Err(Self::UnknownCode { code }),
        }
    }

    /// The offending status code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Client { code } | Self::Server { code } | Self::UnknownCode { code } => *code,
        }
    }
}

/// Encoding and decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A writing operation returned no request payload.
    #[error("Operation writes a body but supplied no request payload")]
    MissingPayload,

    /// A path segment did not resolve.
    #[error("Path `{path}` not found: nothing at `{segment}`")]
    PathNotFound {
        /// Full path expression.
        path: String,
        /// Segment that failed to resolve.
        segment: String,
    },

    /// The value at a path has an unexpected shape.
    #[error(
        "Value at path `{path}` has the wrong shape: expected {expected}, found {actual}{}",
        .detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
    )]
    TypeMismatch {
        /// Full path expression.
        path: String,
        /// Expected shape or target type.
        expected: String,
        /// Shape actually found.
        actual: String,
        /// Deserializer message when the node itself failed to decode.
        detail: Option<String>,
    },

    /// The path expression could not be parsed.
    #[error("Invalid path `{path}`: {reason}")]
    InvalidPath {
        /// Full path expression.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The decoder cannot decode at a path.
    #[error("Decoder does not support path-scoped decoding")]
    PathUnsupported,

    /// A write-only operation declared a response type other than `()`.
    #[error("Write-only operation must use `()` as its response type, found `{0}`")]
    UnitResponse(&'static str),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form serialization error.
    #[error("Form encoding error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
}

/// Failures reported by a transport, kept apart from application errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request could not be built.
    #[error("Failed to build request: {0}")]
    Request(String),

    /// The call was cancelled while in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error("Transport failure: {0}")]
    Other(#[source] BoxError),
}

/// Every failure the pipeline can produce.
#[derive(Debug, Error)]
pub enum CourierError {
    /// The operation decodes at a path but the decoder cannot.
    #[error("<{operation}> requires a path-scoped decoder for parsing, <{decoder}> is configured")]
    DecoderCapability {
        /// Operation type name.
        operation: &'static str,
        /// Decoder type name.
        decoder: &'static str,
    },

    /// Request payload could not be encoded.
    #[error("Encoding failed: {0}")]
    Encoding(#[source] CodecError),

    /// Transport-layer failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Rejected by the status validator.
    #[error(transparent)]
    Status(#[from] HttpStatusError),

    /// Response body could not be decoded.
    #[error("Decoding failed: {0}")]
    Decoding(#[source] CodecError),

    /// Raised by a custom validator or other middleware.
    #[error("{0}")]
    Middleware(#[source] BoxError),

    /// The call was cancelled.
    #[error("Call cancelled")]
    Cancelled,
}

impl CourierError {
    /// Wrap an arbitrary middleware error.
    pub fn custom(error: impl Into<BoxError>) -> Self {
        Self::Middleware(error.into())
    }

    /// Configuration errors are fatal and never offered to recoverers.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::DecoderCapability { .. })
    }

    /// Check if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Transport(TransportError::Cancelled)
        )
    }

    /// Transient failures worth retrying: timeouts, connection failures,
    /// 5xx and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(TransportError::Timeout(_)) => true,
            Self::Transport(TransportError::Connection(_)) => true,
            Self::Status(HttpStatusError::Server { .. }) => true,
            Self::Status(HttpStatusError::Client { code }) => *code == 429,
            _ => false,
        }
    }

    /// The status code if the validator rejected the response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Status and headers of the response an attempt failed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
}

/// The normalized error every failure is wrapped in before it reaches
/// recoverers or the caller.
#[derive(Debug)]
pub struct Exception {
    message: Option<String>,
    cause: Option<CourierError>,
    call_site: CallSite,
    response: Option<ResponseInfo>,
}

impl Exception {
    /// Create an exception.
    pub fn new(message: Option<String>, cause: Option<CourierError>, call_site: CallSite) -> Self {
        Self {
            message,
            cause,
            call_site,
            response: None,
        }
    }

    /// Wrap a pipeline error.
    pub fn wrap(cause: impl Into<CourierError>, call_site: CallSite) -> Self {
        Self::new(None, Some(cause.into()), call_site)
    }

    /// Create an exception carrying only a message.
    pub fn with_message(message: impl Into<String>, call_site: CallSite) -> Self {
        Self::new(Some(message.into()), None, call_site)
    }

    /// Attach the response the failure was observed on.
    pub fn with_response(mut self, response: ResponseInfo) -> Self {
        self.response = Some(response);
        self
    }

    /// Human-readable message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The underlying error.
    pub fn cause(&self) -> Option<&CourierError> {
        self.cause.as_ref()
    }

    /// Consume and return the underlying error.
    pub fn into_cause(self) -> Option<CourierError> {
        self.cause
    }

    /// Where the failing call was issued.
    pub fn call_site(&self) -> &CallSite {
        &self.call_site
    }

    /// The response the failure was observed on, when there was one.
    pub fn response(&self) -> Option<&ResponseInfo> {
        self.response.as_ref()
    }

    /// Status-validator error, if that is the cause.
    pub fn status_error(&self) -> Option<&HttpStatusError> {
        match &self.cause {
            Some(CourierError::Status(e)) => Some(e),
            _ => None,
        }
    }

    /// Status code of a validator rejection.
    pub fn status_code(&self) -> Option<u16> {
        self.cause.as_ref().and_then(CourierError::status_code)
    }

    /// Check if this is a 4xx rejection.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status_error(), Some(HttpStatusError::Client { .. }))
    }

    /// Check if this is a 5xx rejection.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status_error(), Some(HttpStatusError::Server { .. }))
    }

    /// Check if the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cause.as_ref().is_some_and(CourierError::is_cancelled)
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        self.cause.as_ref().is_some_and(CourierError::is_configuration)
    }

    /// Check if the cause is a transient failure.
    pub fn is_retryable(&self) -> bool {
        self.cause.as_ref().is_some_and(CourierError::is_retryable)
    }

    /// Whether recoverers may see this error at all.
    pub(crate) fn is_recoverable(&self) -> bool {
        !self.is_configuration() && !self.is_cancelled()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(message), _) => f.write_str(message),
            (None, Some(cause)) => write!(f, "{cause}"),
            (None, None) => f.write_str("Exception"),
        }
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}
