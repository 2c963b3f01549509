//! In-memory document store.
//!
//! Backs tests and database-less runs of the gateway. Conditional-write
//! semantics are identical to the Postgres store, so broker behavior under
//! revision races can be exercised without a database.

use crate::document::{Document, Revision};
use crate::error::StoreError;
use crate::store::DocumentStore;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// A mutex-guarded map of documents.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, (Revision, Map<String, Value>)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").len()
    }

    /// Returns true if no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.get(id).map(|(revision, body)| {
            Document::new(id.to_string(), *revision, body.clone())
        }))
    }

    async fn put(
        &self,
        id: &str,
        expected: Option<Revision>,
        body: Map<String, Value>,
    ) -> Result<Revision, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        match (inner.get(id).map(|(revision, _)| *revision), expected) {
            (None, None) => {
                let revision = Revision::first();
                inner.insert(id.to_string(), (revision, body));
                Ok(revision)
            }
            (Some(stored), Some(expected)) if stored == expected => {
                let revision = stored.next();
                inner.insert(id.to_string(), (revision, body));
                Ok(revision)
            }
            _ => Err(StoreError::Conflict { id: id.to_string() }),
        }
    }

    async fn delete(&self, id: &str, expected: Revision) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        match inner.get(id).map(|(revision, _)| *revision) {
            Some(stored) if stored == expected => {
                inner.remove(id);
                Ok(())
            }
            _ => Err(StoreError::Conflict { id: id.to_string() }),
        }
    }
}
