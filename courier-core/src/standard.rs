//! Ready-made middleware.

use base64::Engine as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    HeaderContributor, HeaderKey, Headers, HttpStatusError, Middleware, SuccessHook, Validator,
};

impl Validator {
    /// Pass 100-299, raise [`HttpStatusError`] for everything else.
    pub fn status_code() -> Self {
        Self::new(|_, response| HttpStatusError::check(response.status).map_err(Into::into))
    }
}

impl HeaderContributor {
    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: impl Into<String>) -> Self {
        let value = format!("Bearer {}", token.into());
        Self::new(move |_| Headers::new().with(HeaderKey::AUTHORIZATION, &value))
    }

    /// `Authorization: Basic <base64(username:password)>`.
    pub fn basic(username: impl Into<String>, password: Option<impl Into<String>>) -> Self {
        let credentials = match password {
            Some(p) => format!("{}:{}", username.into(), p.into()),
            None => format!("{}:", username.into()),
        };
        let value = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );
        Self::new(move |_| Headers::new().with(HeaderKey::AUTHORIZATION, &value))
    }

    /// An API key sent in a custom header.
    pub fn api_key(header: impl Into<String>, key: impl Into<String>) -> Self {
        let header = HeaderKey::new(header);
        let key = key.into();
        Self::new(move |_| Headers::new().with(&header, &key))
    }

    /// A unique id per attempt in `X-Request-ID`.
    pub fn request_id() -> Self {
        Self::request_id_in("X-Request-ID")
    }

    /// A unique id per attempt in a custom header.
    pub fn request_id_in(header: impl Into<String>) -> Self {
        static SEQUENCE: AtomicU64 = AtomicU64::new(0);

        let header = HeaderKey::new(header);
        Self::new(move |_| {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos();
            let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
            Headers::new().with(&header, format!("{nanos:x}-{sequence:x}"))
        })
    }
}

impl Middleware {
    /// The standard status-code validator as a middleware.
    pub fn status_validation() -> Self {
        Self::named("status-validation").add_validator(Validator::status_code())
    }

    /// Bearer-token authorization as a middleware.
    pub fn bearer_auth(token: impl Into<String>) -> Self {
        Self::named("bearer-auth").add_headers(HeaderContributor::bearer(token))
    }

    /// Debug-level tracing of attempts and successes.
    pub fn tracing() -> Self {
        Self::named("tracing")
            .barrier(|ctx| {
                tracing::debug!(
                    method = %ctx.method,
                    url = %ctx.url,
                    attempt = ctx.attempt,
                    "Starting attempt"
                );
                async {}
            })
            .add_success(SuccessHook::new(|ctx, value| {
                tracing::debug!(
                    operation = ctx.operation,
                    attempt = ctx.attempt,
                    has_value = value.is_some(),
                    "Operation succeeded"
                );
                Ok(())
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpMethod, OperationContext, OperationKind, RawResponse};

    fn ctx() -> OperationContext {
        OperationContext::new("https://example.com", HttpMethod::Get, OperationKind::Read)
    }

    fn response(status: u16) -> RawResponse {
        RawResponse::new(status, Headers::empty(), bytes::Bytes::new())
    }

    #[test]
    fn test_status_validator() {
        let validator = Validator::status_code();
        assert!(validator.call(&ctx(), &response(200)).is_ok());
        assert!(validator.call(&ctx(), &response(101)).is_ok());

        let err = validator.call(&ctx(), &response(404)).unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert!(matches!(
            err,
            crate::CourierError::Status(HttpStatusError::Client { code: 404 })
        ));

        let err = validator.call(&ctx(), &response(503)).unwrap_err();
        assert!(matches!(
            err,
            crate::CourierError::Status(HttpStatusError::Server { code: 503 })
        ));

        let err = validator.call(&ctx(), &response(304)).unwrap_err();
        assert!(matches!(
            err,
            crate::CourierError::Status(HttpStatusError::UnknownCode { code: 304 })
        ));
    }

    #[test]
    fn test_bearer_header() {
        let headers = HeaderContributor::bearer("abc").call(&ctx());
        assert_eq!(headers.get("authorization"), Some("Bearer abc"));
    }

    #[test]
    fn test_basic_header() {
        let headers = HeaderContributor::basic("user", Some("pass")).call(&ctx());
        assert_eq!(headers.get("Authorization"), Some("Basic dXNlcjpwYXNz"));

        let headers = HeaderContributor::basic("user", None::<String>).call(&ctx());
        assert_eq!(headers.get("Authorization"), Some("Basic dXNlcjo="));
    }

    #[test]
    fn test_api_key_header() {
        let headers = HeaderContributor::api_key("X-Api-Key", "secret").call(&ctx());
        assert_eq!(headers.get("x-api-key"), Some("secret"));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let contributor = HeaderContributor::request_id();
        let first = contributor.call(&ctx());
        let second = contributor.call(&ctx());
        assert_ne!(first.get("X-Request-ID"), second.get("X-Request-ID"));
    }
}
