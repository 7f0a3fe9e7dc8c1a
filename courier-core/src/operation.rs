//! Declarative operation descriptors.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{CallSite, Headers};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// `TRACE`
    Trace,
    /// `CONNECT`
    Connect,
}

impl HttpMethod {
    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Head => http::Method::HEAD,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Options => http::Method::OPTIONS,
            HttpMethod::Trace => http::Method::TRACE,
            HttpMethod::Connect => http::Method::CONNECT,
        }
    }
}

/// Which payloads an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Decodes a response, sends no body.
    Read,
    /// Sends a body, ignores the response body.
    Write,
    /// Sends a body and decodes a response.
    ReadWrite,
}

impl OperationKind {
    /// Whether a response payload is decoded.
    pub fn reads(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether a request payload is encoded.
    pub fn writes(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    /// Method used when an operation does not pick one.
    pub fn default_method(&self) -> HttpMethod {
        match self {
            Self::Read => HttpMethod::Get,
            Self::Write | Self::ReadWrite => HttpMethod::Post,
        }
    }
}

/// A declarative description of one HTTP call.
///
/// Read-only operations set `Request = ()`; write-only operations set
/// `Response = ()`. The [`kind`](Operation::kind) tag tells the engine which
/// payloads to process.
///
/// ```
/// use courier_core::{Operation, OperationKind};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
/// }
///
/// struct GetUser(u64);
///
/// impl Operation for GetUser {
///     type Request = ();
///     type Response = User;
///
///     fn url(&self) -> String {
///         format!("https://api.example.com/users/{}", self.0)
///     }
///
///     fn kind(&self) -> OperationKind {
///         OperationKind::Read
///     }
/// }
/// ```
pub trait Operation: Send + Sync {
    /// Request payload type.
    type Request: Serialize + Send + Sync;
    /// Response payload type.
    type Response: DeserializeOwned + Send + 'static;

    /// Target URL.
    fn url(&self) -> String;

    /// Which payloads this operation carries.
    fn kind(&self) -> OperationKind;

    /// HTTP method.
    fn method(&self) -> HttpMethod {
        self.kind().default_method()
    }

    /// Operation-level headers.
    fn headers(&self) -> Headers {
        Headers::empty()
    }

    /// Request payload. Must be `Some` for writing operations.
    fn request(&self) -> Option<&Self::Request> {
        None
    }

    /// Path into the response document to decode from, e.g. `.data.items[0]`.
    fn response_path(&self) -> Option<&str> {
        None
    }

    /// Per-operation timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// What middleware sees of the operation being executed.
///
/// Built once per attempt. The cancellation token is a child of the call's
/// token, so work started from middleware is cancelled with the call.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Type name of the operation.
    pub operation: &'static str,
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Operation-level headers.
    pub headers: Headers,
    /// Payload kind.
    pub kind: OperationKind,
    /// Response path, if any.
    pub response_path: Option<String>,
    /// Effective timeout.
    pub timeout: Option<Duration>,
    /// 1-based attempt number within the logical call.
    pub attempt: u32,
    /// Where the call was issued.
    pub call_site: CallSite,
    /// Cancellation scoped to this call.
    pub cancellation: CancellationToken,
}

impl OperationContext {
    pub(crate) fn for_operation<O: Operation>(
        operation: &O,
        default_timeout: Option<Duration>,
        call_site: CallSite,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            operation: std::any::type_name::<O>(),
            url: operation.url(),
            method: operation.method(),
            headers: operation.headers(),
            kind: operation.kind(),
            response_path: operation.response_path().map(str::to_owned),
            timeout: operation.timeout().or(default_timeout),
            attempt: 1,
            call_site,
            cancellation,
        }
    }

    /// Build a context by hand, mainly for exercising middleware in tests.
    pub fn new(url: impl Into<String>, method: HttpMethod, kind: OperationKind) -> Self {
        Self {
            operation: "",
            url: url.into(),
            method,
            headers: Headers::empty(),
            kind,
            response_path: None,
            timeout: None,
            attempt: 1,
            call_site: CallSite::labeled("manual"),
            cancellation: CancellationToken::new(),
        }
    }

    /// Set the attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}
