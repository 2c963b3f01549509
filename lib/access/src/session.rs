//! Pending tokens and user sessions.
//!
//! Both are documents keyed by the tenant id, so "one pending token per
//! (identity, origin)" and "sessions never shared across origins" fall
//! out of the naming scheme rather than from any lookup logic.

use crate::attrs::AttrBag;
use chrono::{DateTime, Duration, Utc};
use keygate_core::{Identity, Origin, TenantId};
use serde::{Deserialize, Serialize};

/// Server-held record of an unredeemed single-use login token.
///
/// Created on every login request, overwriting any predecessor for the
/// same tenant (a new request revokes the old token). Deleted on
/// successful validation; a failed validation leaves it intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingToken {
    /// The identity that requested login.
    identity: Identity,
    /// Argon2id hash of the raw token. The raw token is never stored.
    token_hash: String,
    /// The origin the login was requested under.
    origin: Origin,
    /// Caller-supplied login details, minus the identity field.
    attrs: AttrBag,
    /// When the token was issued.
    created_at: DateTime<Utc>,
}

impl PendingToken {
    /// Creates a pending token record.
    #[must_use]
    pub fn new(identity: Identity, token_hash: String, origin: Origin, attrs: AttrBag) -> Self {
        Self {
            identity,
            token_hash,
            origin,
            attrs,
            created_at: Utc::now(),
        }
    }

    /// Store key for a tenant's pending token.
    #[must_use]
    pub fn store_id(tenant: &TenantId) -> String {
        format!("token:{tenant}")
    }

    /// Returns the identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the stored token hash.
    #[must_use]
    pub fn token_hash(&self) -> &str {
        &self.token_hash
    }

    /// Returns the origin the token was issued under.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Returns the carried login details.
    #[must_use]
    pub fn attrs(&self) -> &AttrBag {
        &self.attrs
    }

    /// Returns when the token was issued.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if the token is older than `ttl`.
    ///
    /// Expiry is policy, not a property of the record: with no configured
    /// TTL, unvalidated tokens persist until overwritten.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() - self.created_at > ttl
    }
}

/// Server-held record of an authenticated identity's persisted attributes.
///
/// Created lazily on first successful validation or explicit write.
/// Mutated only by merge, and never deleted by logout: logout clears the
/// client-held cookie while this document survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// The authenticated identity.
    identity: Identity,
    /// The origin this session is scoped to.
    origin: Origin,
    /// Accumulated public attributes.
    attrs: AttrBag,
    /// When the session document was created.
    created_at: DateTime<Utc>,
    /// When the session document was last merged into.
    updated_at: DateTime<Utc>,
}

impl UserSession {
    /// Creates an empty session for a tenant.
    #[must_use]
    pub fn new(identity: Identity, origin: Origin) -> Self {
        let now = Utc::now();
        Self {
            identity,
            origin,
            attrs: AttrBag::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Store key for a tenant's session.
    #[must_use]
    pub fn store_id(tenant: &TenantId) -> String {
        format!("session:{tenant}")
    }

    /// Returns the identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the origin.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Returns the accumulated attributes.
    #[must_use]
    pub fn attrs(&self) -> &AttrBag {
        &self.attrs
    }

    /// Merges incoming attributes into the session.
    ///
    /// Merge, never replace: absent keys survive, present keys are
    /// overwritten, reserved-prefix keys in the incoming bag are dropped.
    pub fn merge(&mut self, incoming: &AttrBag) {
        self.attrs.merge(incoming);
        self.updated_at = Utc::now();
    }

    /// Returns when the document was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the document was last written.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: serde_json::Value) -> AttrBag {
        AttrBag::from_map(value.as_object().expect("object literal").clone())
    }

    fn tenant(identity: &str, origin: &str) -> TenantId {
        TenantId::derive(&Identity::from(identity), &Origin::from(origin))
    }

    #[test]
    fn store_ids_are_disjoint_between_tokens_and_sessions() {
        let tenant = tenant("dale@example.com", "http://a/");
        assert_ne!(PendingToken::store_id(&tenant), UserSession::store_id(&tenant));
    }

    #[test]
    fn store_ids_differ_per_origin() {
        let a = tenant("dale@example.com", "http://a/");
        let b = tenant("dale@example.com", "http://b/");
        assert_ne!(PendingToken::store_id(&a), PendingToken::store_id(&b));
        assert_ne!(UserSession::store_id(&a), UserSession::store_id(&b));
    }

    #[test]
    fn pending_token_keeps_details_without_identity_field() {
        let token = PendingToken::new(
            Identity::from("dale@example.com"),
            "$argon2id$stub".to_string(),
            Origin::from("http://a/"),
            bag(json!({"plan": "free"})),
        );
        assert_eq!(token.attrs().get("plan"), Some(&json!("free")));
        assert!(token.attrs().get("email").is_none());
    }

    #[test]
    fn pending_token_expiry_is_relative_to_creation() {
        let token = PendingToken::new(
            Identity::from("dale@example.com"),
            "$argon2id$stub".to_string(),
            Origin::from("http://a/"),
            AttrBag::new(),
        );
        assert!(!token.is_expired(Duration::minutes(10)));
        assert!(token.is_expired(Duration::seconds(-1)));
    }

    #[test]
    fn session_merge_accumulates() {
        let mut session =
            UserSession::new(Identity::from("dale@example.com"), Origin::from("http://a/"));
        session.merge(&bag(json!({"a": 1})));
        session.merge(&bag(json!({"b": 2})));

        assert_eq!(session.attrs().get("a"), Some(&json!(1)));
        assert_eq!(session.attrs().get("b"), Some(&json!(2)));
    }

    #[test]
    fn session_merge_drops_reserved_keys() {
        let mut session =
            UserSession::new(Identity::from("dale@example.com"), Origin::from("http://a/"));
        session.merge(&bag(json!({"_rev": "spoof", "a": 1})));
        assert!(session.attrs().get("_rev").is_none());
        assert_eq!(session.attrs().get("a"), Some(&json!(1)));
    }

    #[test]
    fn session_merge_advances_updated_at() {
        let mut session =
            UserSession::new(Identity::from("dale@example.com"), Origin::from("http://a/"));
        let created = session.created_at();
        std::thread::sleep(std::time::Duration::from_millis(5));
        session.merge(&bag(json!({"a": 1})));
        assert!(session.updated_at() > created);
    }

    #[test]
    fn documents_serde_roundtrip() {
        let token = PendingToken::new(
            Identity::from("dale@example.com"),
            "$argon2id$stub".to_string(),
            Origin::from("http://a/"),
            bag(json!({"plan": "free"})),
        );
        let json = serde_json::to_string(&token).expect("serialize");
        let parsed: PendingToken = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(token, parsed);

        let session =
            UserSession::new(Identity::from("dale@example.com"), Origin::from("http://a/"));
        let json = serde_json::to_string(&session).expect("serialize");
        let parsed: UserSession = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(session, parsed);
    }
}
