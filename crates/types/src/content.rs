//! Content references published to the registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default upper bound on the byte length of a content reference.
pub const DEFAULT_MAX_CONTENT_REF_LEN: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentRefError {
    #[error("content reference is empty")]
    Empty,
    #[error("content reference is {actual} bytes, limit is {max}")]
    TooLong { max: usize, actual: usize },
}

/// Opaque locator for content held in content-addressed storage.
///
/// Canonical values look like `storage://<hash>` or `ipfs://<cid>`, but the
/// registry never interprets them: the string is stored and returned
/// verbatim. The only checks are non-emptiness and a length bound.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentRef(String);

impl ContentRef {
    /// Build a reference using [`DEFAULT_MAX_CONTENT_REF_LEN`].
    pub fn new(value: impl Into<String>) -> Result<Self, ContentRefError> {
        Self::with_limit(value, DEFAULT_MAX_CONTENT_REF_LEN)
    }

    /// Build a reference with an explicit length bound.
    pub fn with_limit(value: impl Into<String>, max_len: usize) -> Result<Self, ContentRefError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ContentRefError::Empty);
        }
        if value.len() > max_len {
            return Err(ContentRefError::TooLong {
                max: max_len,
                actual: value.len(),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// URI scheme if the reference has the `scheme://rest` shape.
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentRef({:?})", self.0)
    }
}

impl AsRef<str> for ContentRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ContentRef> for String {
    fn from(value: ContentRef) -> Self {
        value.0
    }
}

impl TryFrom<String> for ContentRef {
    type Error = ContentRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContentRef::new(value)
    }
}

impl TryFrom<&str> for ContentRef {
    type Error = ContentRefError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ContentRef::new(value)
    }
}
