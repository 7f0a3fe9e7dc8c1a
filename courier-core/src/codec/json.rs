//! JSON codec.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{EncodedBody, JsonPath, RequestEncoder, ResponseDecoder};
use crate::{CodecError, HeaderKey, Headers};

/// JSON encoder and path-capable decoder.
///
/// An empty (or all-whitespace) response body decodes as JSON `null`, so
/// `()` and `Option<T>` response types accept `204 No Content`. The same
/// holds when decoding at a path, since a blank body has nothing to walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Create a codec producing compact JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce pretty-printed request bodies.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

impl RequestEncoder for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<EncodedBody, CodecError> {
        let data = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };

        Ok(EncodedBody::new(
            data,
            Headers::new().with(HeaderKey::CONTENT_TYPE, "application/json"),
        ))
    }
}

impl ResponseDecoder for JsonCodec {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError> {
        if is_blank(body) {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(body)?)
    }

    fn supports_path(&self) -> bool {
        true
    }

    fn decode_at<T: DeserializeOwned>(&self, body: &[u8], path: &str) -> Result<T, CodecError> {
        let path = JsonPath::parse(path)?;
        if is_blank(body) {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        path.decode(body)
    }
}
