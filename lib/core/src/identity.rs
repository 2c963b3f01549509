//! Identity and origin newtypes.
//!
//! An [`Identity`] is the string a caller authenticates as (an email-like
//! address in practice). An [`Origin`] is the requesting application's
//! declared source, taken from the `Origin` header of the request that
//! started a login. Every piece of per-user state in keygate is scoped by
//! the *pair* of the two, never by the identity alone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The string a caller authenticates as.
///
/// Identities are opaque to keygate: no address validation is performed
/// beyond non-emptiness, because delivery failure already covers the
/// undeliverable case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Creates a new identity from a string.
    #[must_use]
    pub fn new(identity: String) -> Self {
        Self(identity)
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identity is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The requesting application's declared source.
///
/// Origins scope isolation: the same identity under two different origins
/// owns two unrelated sessions and two unrelated tenant databases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Creates a new origin from a string.
    #[must_use]
    pub fn new(origin: String) -> Self {
        Self(origin)
    }

    /// Returns the origin as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Origin {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Origin {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_display() {
        let id = Identity::from("dale@example.com");
        assert_eq!(id.to_string(), "dale@example.com");
    }

    #[test]
    fn identity_from_string() {
        let id: Identity = "dale@example.com".to_string().into();
        assert_eq!(id.as_str(), "dale@example.com");
    }

    #[test]
    fn identity_emptiness() {
        assert!(Identity::from("").is_empty());
        assert!(!Identity::from("a").is_empty());
    }

    #[test]
    fn origin_display() {
        let origin = Origin::from("http://app.example.com/");
        assert_eq!(origin.to_string(), "http://app.example.com/");
    }

    #[test]
    fn identity_serde_is_transparent() {
        let id = Identity::from("dale@example.com");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"dale@example.com\"");
        let parsed: Identity = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, parsed);
    }
}
