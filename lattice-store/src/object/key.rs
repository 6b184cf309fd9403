//! Property keys.

use std::fmt;
use std::sync::Arc;

/// A property key: a canonical array index or a string name.
///
/// Numeric strings are canonicalized, so `"3"` and `3u32` are the same key
/// while `"03"` stays a string. The largest index is `u32::MAX - 1`, the
/// same bound arrays place on their indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Array index.
    Index(u32),
    /// Any other name.
    String(Arc<str>),
}

impl PropertyKey {
    /// The name of the array `length` property.
    pub const LENGTH: &'static str = "length";

    /// Build a key from a name, canonicalizing numeric strings to indices.
    pub fn string(s: &str) -> Self {
        if let Ok(n) = s.parse::<u32>() {
            if n != u32::MAX && n.to_string() == s {
                return Self::Index(n);
            }
        }
        Self::String(Arc::from(s))
    }

    /// The `length` key.
    pub fn length() -> Self {
        Self::String(Arc::from(Self::LENGTH))
    }

    /// Get the index if this key is one.
    pub fn as_index(&self) -> Option<u32> {
        match self {
            Self::Index(i) => Some(*i),
            Self::String(_) => None,
        }
    }

    /// Check if this is the `length` key.
    pub fn is_length(&self) -> bool {
        matches!(self, Self::String(s) if &**s == Self::LENGTH)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        Self::string(&s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        if i == u32::MAX {
            Self::String(Arc::from(i.to_string()))
        } else {
            Self::Index(i)
        }
    }
}

impl From<usize> for PropertyKey {
    fn from(i: usize) -> Self {
        match u32::try_from(i) {
            Ok(i) => Self::from(i),
            Err(_) => Self::String(Arc::from(i.to_string())),
        }
    }
}

/// Negative numbers are names, like `"-1"`.
impl From<i32> for PropertyKey {
    fn from(i: i32) -> Self {
        match u32::try_from(i) {
            Ok(i) => Self::from(i),
            Err(_) => Self::String(Arc::from(i.to_string())),
        }
    }
}

impl From<&PropertyKey> for PropertyKey {
    fn from(key: &PropertyKey) -> Self {
        key.clone()
    }
}
