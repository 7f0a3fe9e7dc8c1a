//! Path-scoped extraction from JSON documents.
//!
//! Grammar: `.name` selects an object member and `[n]` selects an array
//! element, applied left to right. The leading dot may be omitted, so
//! `items[1].id` and `.items[1].id` are the same path.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

use crate::CodecError;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, ".{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Parse a path expression. `""` and `"."` address the whole document.
    pub fn parse(path: &str) -> Result<Self, CodecError> {
        let invalid = |reason: &str| CodecError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        if path.is_empty() || path == "." {
            return Ok(Self {
                raw: path.to_string(),
                segments,
            });
        }

        let bytes = path.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            match bytes[pos] {
                b'[' => {
                    let close = path[pos..]
                        .find(']')
                        .map(|offset| pos + offset)
                        .ok_or_else(|| invalid("unterminated `[`"))?;
                    let index = path[pos + 1..close]
                        .parse::<usize>()
                        .map_err(|_| invalid("array index must be a non-negative integer"))?;
                    segments.push(PathSegment::Index(index));
                    pos = close + 1;
                }
                b'.' => {
                    let (key, next) = read_key(path, pos + 1);
                    if key.is_empty() {
                        return Err(invalid("empty member name"));
                    }
                    segments.push(PathSegment::Key(key.to_string()));
                    pos = next;
                }
                b']' => return Err(invalid("unexpected `]`")),
                _ if pos == 0 => {
                    let (key, next) = read_key(path, 0);
                    segments.push(PathSegment::Key(key.to_string()));
                    pos = next;
                }
                _ => return Err(invalid("expected `.` or `[`")),
            }
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether this path addresses the whole document.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk `value` and return the node at this path.
    pub fn extract(&self, value: Value) -> Result<Value, CodecError> {
        let mut current = value;
        let mut walked = String::new();

        for segment in &self.segments {
            walked.push_str(&segment.to_string());
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(mut map)) => {
                    map.remove(key).ok_or_else(|| self.not_found(&walked))?
                }
                (PathSegment::Index(index), Value::Array(mut items)) => {
                    if *index >= items.len() {
                        return Err(self.not_found(&walked));
                    }
                    items.swap_remove(*index)
                }
                (PathSegment::Key(_), other) => {
                    return Err(self.mismatch("object", &other));
                }
                (PathSegment::Index(_), other) => {
                    return Err(self.mismatch("array", &other));
                }
            };
        }

        Ok(current)
    }

    /// Parse `body` as JSON and decode the node at this path into `T`.
    pub fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError> {
        let document: Value = serde_json::from_slice(body)?;
        let node = self.extract(document)?;
        let actual = kind_of(&node);

        serde_json::from_value(node).map_err(|e| CodecError::TypeMismatch {
            path: self.raw.clone(),
            expected: std::any::type_name::<T>().to_string(),
            actual: actual.to_string(),
            detail: Some(e.to_string()),
        })
    }

    fn not_found(&self, walked: &str) -> CodecError {
        CodecError::PathNotFound {
            path: self.raw.clone(),
            segment: walked.to_string(),
        }
    }

    fn mismatch(&self, expected: &str, found: &Value) -> CodecError {
        CodecError::TypeMismatch {
            path: self.raw.clone(),
            expected: expected.to_string(),
            actual: kind_of(found).to_string(),
            detail: None,
        }
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn read_key(path: &str, start: usize) -> (&str, usize) {
    let end = path[start..]
        .find(['.', '[', ']'])
        .map(|offset| start + offset)
        .unwrap_or(path.len());
    (&path[start..end], end)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_segments() {
        let path = JsonPath::parse("items[1].id").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("items".into()),
                PathSegment::Index(1),
                PathSegment::Key("id".into()),
            ]
        );

        let dotted = JsonPath::parse(".items[1].id").unwrap();
        assert_eq!(dotted.segments(), path.segments());
    }

    #[test]
    fn test_parse_nested_indexes() {
        let path = JsonPath::parse(".grid[2][0]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("grid".into()),
                PathSegment::Index(2),
                PathSegment::Index(0),
            ]
        );
    }

    #[test]
    fn test_root_paths() {
        assert!(JsonPath::parse("").unwrap().is_root());
        assert!(JsonPath::parse(".").unwrap().is_root());
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["a..b", "a[", "a[x]", "a[-1]", "a]b", "[0]x"] {
            assert!(
                matches!(JsonPath::parse(bad), Err(CodecError::InvalidPath { .. })),
                "expected {bad} to be rejected"
            );
        }
    }

    #[test]
    fn test_decode_boolean_member() {
        let path = JsonPath::parse(".success").unwrap();
        let value: bool = path.decode(br#"{"success": true}"#).unwrap();
        assert!(value);
    }

    #[test]
    fn test_decode_through_array() {
        let path = JsonPath::parse("items[1].id").unwrap();
        let value: u32 = path
            .decode(br#"{"items":[{"id":1},{"id":2}]}"#)
            .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_decode_struct_skipping_siblings() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Owner {
            name: String,
        }

        let body = json!({
            "meta": {"page": 1, "tags": ["a", "b"]},
            "data": {"repos": [{"owner": {"name": "kim", "extra": [1, 2]}}]}
        });
        let path = JsonPath::parse(".data.repos[0].owner").unwrap();
        let owner: Owner = path.decode(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            owner,
            Owner {
                name: "kim".into()
            }
        );
    }

    #[test]
    fn test_missing_member_names_path() {
        let path = JsonPath::parse(".data.missing").unwrap();
        let err = path.decode::<bool>(br#"{"data": {}}"#).unwrap_err();
        match err {
            CodecError::PathNotFound { path, segment } => {
                assert_eq!(path, ".data.missing");
                assert_eq!(segment, ".data.missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_index_out_of_bounds() {
        let path = JsonPath::parse("items[5]").unwrap();
        let err = path.decode::<u32>(br#"{"items":[1]}"#).unwrap_err();
        assert!(matches!(err, CodecError::PathNotFound { segment, .. } if segment == ".items[5]"));
    }

    #[test]
    fn test_terminal_type_mismatch() {
        let path = JsonPath::parse(".success").unwrap();
        let err = path.decode::<bool>(br#"{"success": "yes"}"#).unwrap_err();
        match err {
            CodecError::TypeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "bool");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nested_mismatch_keeps_deserializer_message() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Owner {
            name: String,
        }

        let path = JsonPath::parse(".data.owner").unwrap();
        let err = path
            .decode::<Owner>(br#"{"data": {"owner": {"login": "kim"}}}"#)
            .unwrap_err();
        match &err {
            CodecError::TypeMismatch { actual, detail, .. } => {
                assert_eq!(actual, "object");
                assert!(detail.as_deref().unwrap_or_default().contains("missing field `name`"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("missing field `name`"));
    }

    #[test]
    fn test_intermediate_shape_mismatch() {
        let path = JsonPath::parse(".items.id").unwrap();
        let err = path.decode::<u32>(br#"{"items":[1]}"#).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TypeMismatch { ref expected, ref actual, .. }
                if expected == "object" && actual == "array"
        ));
    }
}
