//! Client identity type
//!
//! Field clients are addressed by an opaque identity string issued outside
//! the relay. The same string names the room monitors join to follow that
//! client's stream.

use serde::{Deserialize, Serialize};

/// Opaque identity of a field client
///
/// The relay never generates or validates the format; it only requires the
/// string to be non-empty. Uniqueness holds for the lifetime of one relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Create a new identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an identity, returning `None` for an empty string
    pub fn parse(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Borrow the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClientIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ClientIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
