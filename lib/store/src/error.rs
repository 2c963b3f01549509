//! Error types for the store crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StoreError`: document store failures, including the conflict
//!   signal that conditional writes report.

use std::fmt;

/// Errors from document store operations.
///
/// `Conflict` is not exceptional: it is how the store tells a caller that
/// the revision it read has since moved, and callers race on it on
/// purpose (single-use token deletion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No document exists under the given id.
    NotFound { id: String },
    /// The expected revision did not match the stored one.
    Conflict { id: String },
    /// The backing engine failed.
    Backend { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => {
                write!(f, "document '{id}' not found")
            }
            Self::Conflict { id } => {
                write!(f, "revision conflict on document '{id}'")
            }
            Self::Backend { details } => {
                write!(f, "storage backend error: {details}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// Returns true for the revision-conflict signal.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
