//! Caller-supplied API credentials.
//!
//! A [`Credential`] holds a backend API key in memory and zeroizes it on drop.
//! The value never appears in `Debug` output or in serialized configuration.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Placeholder written wherever a credential would otherwise be displayed.
pub const REDACTED: &str = "[REDACTED]";

/// An API key or bearer token with automatic zeroization.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    inner: String,
}

impl Credential {
    /// Wrap a raw key.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Borrow the raw key. Only request builders should call this.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Whether the key is empty (or only whitespace).
    pub fn is_empty(&self) -> bool {
        self.inner.trim().is_empty()
    }

    /// Key length, without exposing the value.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("inner", &REDACTED)
            .field("len", &self.inner.len())
            .finish()
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Serializes as [`REDACTED`] so that dumping a loaded config never leaks keys.
impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}
