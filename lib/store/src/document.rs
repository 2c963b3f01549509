//! Documents and revisions.
//!
//! A document is a JSON object stored under a caller-chosen string id,
//! together with a monotonically increasing revision. Revisions are the
//! basis of every conditional write in keygate: a put or delete names the
//! revision it read, and the store refuses the write if the document has
//! moved since.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A document revision.
///
/// Revisions start at 1 on creation and increase by one on every
/// successful put. They carry no meaning beyond ordering within a single
/// document's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// The revision assigned to a newly created document.
    #[must_use]
    pub const fn first() -> Self {
        Self(1)
    }

    /// The revision a successful put on this revision produces.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Creates a revision from a stored numeric value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored document: id, revision, and JSON object body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The store key.
    pub id: String,
    /// The revision the body was read at.
    pub revision: Revision,
    /// The JSON object body.
    pub body: Map<String, Value>,
}

impl Document {
    /// Creates a document value.
    #[must_use]
    pub fn new(id: String, revision: Revision, body: Map<String, Value>) -> Self {
        Self { id, revision, body }
    }
}
