//! Encoder and decoder contracts plus the bundled codecs.

mod form;
mod json;
mod path;

pub use form::{FormEncoder, query_string, with_query};
pub use json::JsonCodec;
pub use path::{JsonPath, PathSegment};

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{CodecError, Headers};

/// An encoded request body and the headers describing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBody {
    /// Body bytes.
    pub data: Bytes,
    /// Metadata headers such as `Content-Type`. Lowest priority in the merge.
    pub headers: Headers,
}

impl EncodedBody {
    /// Create an encoded body.
    pub fn new(data: impl Into<Bytes>, headers: Headers) -> Self {
        Self {
            data: data.into(),
            headers,
        }
    }
}

/// Turns a typed request payload into bytes.
pub trait RequestEncoder: Send + Sync {
    /// Encode `value`.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<EncodedBody, CodecError>;
}

/// Turns response bytes into a typed value.
pub trait ResponseDecoder: Send + Sync {
    /// Decode the whole body.
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError>;

    /// Whether [`decode_at`](Self::decode_at) is supported. The engine checks
    /// this before executing an operation with a response path.
    fn supports_path(&self) -> bool {
        false
    }

    /// Decode only the value reachable at `path`.
    fn decode_at<T: DeserializeOwned>(&self, body: &[u8], path: &str) -> Result<T, CodecError> {
        let _ = (body, path);
        Err(CodecError::PathUnsupported)
    }
}
