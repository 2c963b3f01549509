//! The document store abstraction.
//!
//! Keygate keeps pending tokens and user sessions in a keyed document
//! store behind this trait. The storage engine is an external
//! collaborator; the broker only ever needs get, revision-conditioned
//! put, and revision-conditioned delete. No process-held lock coordinates
//! concurrent requests; correctness of single-use-token semantics rests
//! entirely on the conditional writes defined here.

use crate::document::{Document, Revision};
use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A keyed document store with revision-checked writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document by id. Absence is not an error.
    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Writes a document body, conditioned on the revision the caller read.
    ///
    /// `expected = None` creates the document and fails with `Conflict` if
    /// it already exists; `expected = Some(rev)` replaces the body only if
    /// the stored revision still equals `rev`. Returns the new revision.
    async fn put(
        &self,
        id: &str,
        expected: Option<Revision>,
        body: Map<String, Value>,
    ) -> Result<Revision, StoreError>;

    /// Deletes a document, conditioned on the revision the caller read.
    ///
    /// Fails with `Conflict` when the document is gone or has moved past
    /// `expected`; the caller cannot tell the two apart, and does not
    /// need to.
    async fn delete(&self, id: &str, expected: Revision) -> Result<(), StoreError>;
}
