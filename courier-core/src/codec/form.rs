//! URL-encoded form bodies and query strings.

use serde::Serialize;

use super::{EncodedBody, RequestEncoder};
use crate::{CodecError, HeaderKey, Headers};

/// Encodes request payloads as `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormEncoder;

impl RequestEncoder for FormEncoder {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<EncodedBody, CodecError> {
        let encoded = serde_urlencoded::to_string(value)?;
        Ok(EncodedBody::new(
            encoded.into_bytes(),
            Headers::new().with(
                HeaderKey::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            ),
        ))
    }
}

/// Serialize `value` as a query string, without the leading `?`.
pub fn query_string<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_urlencoded::to_string(value)?)
}

/// Append the query string for `value` to `url`.
pub fn with_query<T: Serialize + ?Sized>(url: &str, value: &T) -> Result<String, CodecError> {
    let query = query_string(value)?;
    if query.is_empty() {
        return Ok(url.to_string());
    }

    let separator = if url.contains('?') { '&' } else { '?' };
    Ok(format!("{url}{separator}{query}"))
}
