//! Tenant naming.
//!
//! A [`TenantId`] is the canonical resource identifier for an
//! (identity, origin) pair. The same derivation is used for pending-token
//! and session store keys and for the name of the tenant's backing
//! database, so isolation between tenants reduces to injectivity of this
//! one function.

use crate::identity::{Identity, Origin};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the encoded identity and encoded origin.
const SEPARATOR: char = '_';

/// Percent-encodes one component of a tenant id.
///
/// `_` is unreserved and passes through percent-encoding untouched, so it
/// gets escaped by hand: the join separator must never occur inside an
/// encoded half, or `("a", "_b")` and `("a_", "b")` would collide.
fn encode_component(raw: &str) -> String {
    urlencoding::encode(raw).replace('_', "%5F")
}

/// Canonical identifier for an (identity, origin) tenant.
///
/// Both inputs are percent-encoded before being joined, which guarantees
/// that distinct pairs can never collide: the separator cannot appear in
/// either encoded half, so the split point is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Derives the tenant id for an (identity, origin) pair.
    ///
    /// Deterministic: the same pair always re-derives the same id.
    #[must_use]
    pub fn derive(identity: &Identity, origin: &Origin) -> Self {
        let encoded_identity = encode_component(identity.as_str());
        let encoded_origin = encode_component(origin.as_str());
        Self(format!("{encoded_identity}{SEPARATOR}{encoded_origin}"))
    }

    /// Returns the tenant id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the backing database name for this tenant.
    ///
    /// The prefix lets multiple keygate deployments share one storage
    /// cluster without their tenant databases mixing.
    #[must_use]
    pub fn database_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
