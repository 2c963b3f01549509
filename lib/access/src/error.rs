//! Error types for the access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthError`: broker pipeline failures
//!
//! `Verification` deliberately carries no detail. A missing pending token
//! and a wrong token must be indistinguishable to callers, or the error
//! becomes an identity-enumeration oracle.

use std::fmt;

/// Errors from broker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token verification failed (absent, expired, or wrong token).
    Verification,
    /// The login details bag has no identity field.
    MissingIdentity,
    /// The token or session store failed.
    Storage { details: String },
    /// Token hashing failed.
    Hash { details: String },
    /// An external call exceeded its per-call timeout.
    Timeout { operation: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verification => {
                write!(f, "verification failed")
            }
            Self::MissingIdentity => {
                write!(f, "login details are missing an identity")
            }
            Self::Storage { details } => {
                write!(f, "auth storage error: {details}")
            }
            Self::Hash { details } => {
                write!(f, "token hashing error: {details}")
            }
            Self::Timeout { operation } => {
                write!(f, "operation '{operation}' timed out")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    /// Returns true for the generic verification failure.
    #[must_use]
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification)
    }
}
