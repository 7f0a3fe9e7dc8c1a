//! Case-insensitive header model.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Header name that compares and hashes without regard to ASCII case.
///
/// The name is kept exactly as supplied so it can be sent on the wire and
/// shown in logs the way the caller wrote it.
#[derive(Debug, Clone)]
pub struct HeaderKey {
    name: Cow<'static, str>,
}

impl HeaderKey {
    /// `Authorization`
    pub const AUTHORIZATION: HeaderKey = HeaderKey::from_static("Authorization");
    /// `Content-Type`
    pub const CONTENT_TYPE: HeaderKey = HeaderKey::from_static("Content-Type");
    /// `Retry-After`
    pub const RETRY_AFTER: HeaderKey = HeaderKey::from_static("Retry-After");
    /// `Content-Encoding`
    pub const CONTENT_ENCODING: HeaderKey = HeaderKey::from_static("Content-Encoding");
    /// `Content-Length`
    pub const CONTENT_LENGTH: HeaderKey = HeaderKey::from_static("Content-Length");

    /// Create a key from a static name.
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
        }
    }

    /// Create a key from any name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
        }
    }

    /// Create a key for a non-standard header.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    /// The name as originally supplied.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lowercase form used for equality.
    pub fn normalized(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for HeaderKey {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.name)
    }
}

impl Eq for HeaderKey {}

impl Hash for HeaderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.name.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for HeaderKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for HeaderKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&HeaderKey> for HeaderKey {
    fn from(key: &HeaderKey) -> Self {
        key.clone()
    }
}

/// A single header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Header name.
    pub key: HeaderKey,
    /// Header value.
    pub value: String,
}

impl Header {
    /// Create a header entry.
    pub fn new(key: impl Into<HeaderKey>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// A set of headers keyed case-insensitively.
///
/// Each key appears at most once. Inserting an existing key replaces both the
/// display name and the value, which is what gives merges their
/// last-writer-wins behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    values: Vec<Header>,
}

impl Headers {
    /// Create an empty header set.
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// The identity value for merges.
    pub const fn empty() -> Self {
        Self::new()
    }

    /// Build from key/value pairs. Later duplicates override earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<HeaderKey>,
        V: ToString,
    {
        pairs.into_iter().collect()
    }

    /// Build from a wire-format map. Names are lowercased; values that are
    /// not visible ASCII are skipped. A name repeated on the wire (such as
    /// `Set-Cookie`) becomes one entry with its values joined by `", "` in
    /// arrival order.
    pub fn from_raw(map: &http::HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let name = name.as_str().to_ascii_lowercase();
            let value = match headers.get(&name) {
                Some(existing) => format!("{existing}, {value}"),
                None => value.to_string(),
            };
            headers.insert(name, value);
        }
        headers
    }

    /// Insert a header, replacing any existing entry for the same key.
    pub fn insert(&mut self, key: impl Into<HeaderKey>, value: impl ToString) {
        self.put(Header::new(key, value));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<HeaderKey>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    fn put(&mut self, header: Header) {
        match self.values.iter_mut().find(|h| h.key == header.key) {
            Some(existing) => *existing = header,
            None => self.values.push(header),
        }
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|h| h.key.matches(name))
            .map(|h| h.value.as_str())
    }

    /// Look up a value by key.
    pub fn get_key(&self, key: &HeaderKey) -> Option<&str> {
        self.get(key.name())
    }

    /// Whether a header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.values.iter().position(|h| h.key.matches(name))?;
        Some(self.values.remove(index).value)
    }

    /// Overlay `other` on top of `self`; entries in `other` win.
    pub fn merge(&mut self, other: &Headers) {
        for header in &other.values {
            self.put(header.clone());
        }
    }

    /// Consuming form of [`merge`](Self::merge).
    pub fn merged(mut self, other: &Headers) -> Self {
        self.merge(other);
        self
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.values.iter()
    }
}

impl<K: Into<HeaderKey>, V: ToString> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        headers.extend(iter);
        headers
    }
}

impl<K: Into<HeaderKey>, V: ToString> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl IntoIterator for Headers {
    type Item = Header;
    type IntoIter = std::vec::IntoIter<Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
