//! Caller-supplied attribute bags.
//!
//! Login details and session writes both carry arbitrary key-value
//! attributes. The bag is an ordered string-keyed JSON map with one rule:
//! keys starting with the reserved prefix belong to keygate, and are
//! dropped from incoming data at every merge boundary so a caller can
//! never smuggle one in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix marking keys reserved for internal use.
pub const RESERVED_PREFIX: char = '_';

/// An ordered bag of caller-supplied attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrBag(Map<String, Value>);

impl AttrBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a raw map without filtering.
    ///
    /// Reserved keys are allowed to sit in the bag; they are discarded at
    /// merge time, which is the boundary the blocklist guards.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Removes and returns a value by key.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Merges another bag into this one, key by key, in the incoming
    /// bag's order. Existing keys are overwritten; reserved-prefix keys
    /// in the incoming bag are dropped.
    pub fn merge(&mut self, incoming: &AttrBag) {
        for (key, value) in &incoming.0 {
            if key.starts_with(RESERVED_PREFIX) {
                continue;
            }
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the bag holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the bag, returning the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for AttrBag {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}
