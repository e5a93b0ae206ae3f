//! JSON Pointer (RFC 6901) paths.
//!
//! Used both to address schema fragments inside a document and to locate the
//! instance node a diagnostic refers to.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::EngineError;

/// A parsed JSON Pointer: a sequence of unescaped reference tokens.
///
/// The empty pointer addresses the whole document and renders as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPointer(Vec<String>);

impl JsonPointer {
    /// The pointer to the document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a pointer string (`""`, `"/a/b"`).
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidPointer` if the string does not start with
    /// `/` or contains an invalid `~` escape.
    pub fn parse(pointer: &str) -> Result<Self, EngineError> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(EngineError::InvalidPointer {
                pointer: pointer.to_string(),
                reason: "must be empty or start with '/'".to_string(),
            });
        };

        rest.split('/')
            .map(|token| unescape(token, pointer))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Parse a URI fragment (without the leading `#`) as a pointer.
    ///
    /// The fragment is percent-decoded first, as URI fragments carry the
    /// pointer in percent-encoded form.
    pub fn from_fragment(fragment: &str) -> Result<Self, EngineError> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        Self::parse(&percent_decode(fragment))
    }

    /// Returns the unescaped tokens.
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a token in place.
    pub fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }

    /// Remove the last token in place.
    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    /// Returns a new pointer with `token` appended.
    pub fn append(&self, token: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.push(token);
        next
    }

    /// Returns a new pointer with every token of `tokens` appended.
    pub fn extend<I, T>(&self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut next = self.clone();
        next.0.extend(tokens.into_iter().map(Into::into));
        next
    }

    /// Concatenate two pointers.
    pub fn join(&self, other: &JsonPointer) -> Self {
        self.extend(other.0.iter().cloned())
    }

    /// True if `self` is `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &JsonPointer) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Walk `value` along this pointer.
    ///
    /// Array tokens must be canonical decimal indices (no leading zeros).
    pub fn get<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut current = value;
        for token in &self.0 {
            current = match current {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => items.get(parse_index(token)?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Render as a URI fragment, including the leading `#`.
    pub fn to_fragment(&self) -> String {
        format!("#{}", self)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<T: Into<String>> FromIterator<T> for JsonPointer {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

fn unescape(token: &str, pointer: &str) -> Result<String, EngineError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(EngineError::InvalidPointer {
                    pointer: pointer.to_string(),
                    reason: "'~' must be followed by '0' or '1'".to_string(),
                })
            }
        }
    }
    Ok(out)
}

fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Decode `%XX` sequences. Invalid sequences are kept verbatim.
pub(crate) fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
