//! Postgres-backed document store.
//!
//! Documents live in a single `documents` table with a numeric revision
//! column. Every write names the revision it expects; the `WHERE
//! revision = $n` guard makes the write a compare-and-swap, which is all
//! the broker needs for overwrite-on-login and single-use deletion.

use crate::document::{Document, Revision};
use crate::error::StoreError;
use crate::store::DocumentStore;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};

/// Row type for document queries.
#[derive(FromRow)]
struct DocumentRow {
    id: String,
    revision: i64,
    body: Value,
}

impl DocumentRow {
    fn try_into_document(self) -> Result<Document, StoreError> {
        let Value::Object(body) = self.body else {
            return Err(StoreError::Backend {
                details: format!("document '{}' body is not a JSON object", self.id),
            });
        };
        Ok(Document::new(
            self.id,
            Revision::from_u64(self.revision as u64),
            body,
        ))
    }
}

/// Document store over a Postgres connection pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new Postgres-backed store.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend {
        details: e.to_string(),
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, revision, body
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(r) => Ok(Some(r.try_into_document()?)),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        id: &str,
        expected: Option<Revision>,
        body: Map<String, Value>,
    ) -> Result<Revision, StoreError> {
        let body = Value::Object(body);
        match expected {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO documents (id, revision, body, created_at, updated_at)
                    VALUES ($1, 1, $2, NOW(), NOW())
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(body)
                .execute(&self.pool)
                .await
                .map_err(backend)?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict { id: id.to_string() });
                }
                Ok(Revision::first())
            }
            Some(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE documents
                    SET revision = revision + 1, body = $3, updated_at = NOW()
                    WHERE id = $1 AND revision = $2
                    "#,
                )
                .bind(id)
                .bind(expected.as_u64() as i64)
                .bind(body)
                .execute(&self.pool)
                .await
                .map_err(backend)?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict { id: id.to_string() });
                }
                Ok(expected.next())
            }
        }
    }

    async fn delete(&self, id: &str, expected: Revision) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE id = $1 AND revision = $2
            "#,
        )
        .bind(id)
        .bind(expected.as_u64() as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict { id: id.to_string() });
        }
        Ok(())
    }
}
