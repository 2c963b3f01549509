//! The auth broker: login request and token validation pipelines.
//!
//! Both pipelines are explicit sequences of fallible steps over a shared
//! context, short-circuiting on the first failure. Nothing is retried and
//! nothing committed by an earlier step is rolled back by a later one.
//! Every external call (hashing, store reads and writes, delivery) runs
//! under its own timeout and surfaces a distinct timeout error.
//!
//! Concurrency rests on the store, not on locks: overwriting a pending
//! token names the revision it read, and the single-use delete at the end
//! of validation names the revision read at the start, so of two racing
//! validators at most one can win.

use crate::attrs::AttrBag;
use crate::error::AuthError;
use crate::session::{PendingToken, UserSession};
use crate::token::{generate_login_token, hash_login_token, verify_login_token, HashCost};
use chrono::Duration as TokenTtl;
use keygate_core::{Identity, Origin, TenantId};
use keygate_notify::Notifier;
use keygate_store::{DocumentStore, Revision, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Key of the identity field in login details.
pub const IDENTITY_FIELD: &str = "email";

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Public base URL of the gateway, with trailing slash. Embedded in
    /// delivery URLs and in the tenant database URL handed to clients.
    pub public_url: String,

    /// Timeout applied to each external call individually.
    pub call_timeout: Duration,

    /// Argon2id work factor for token hashing.
    pub hash_cost: HashCost,

    /// Optional pending-token expiry. `None` means unvalidated tokens
    /// persist until the next login request overwrites them.
    pub pending_token_ttl: Option<TokenTtl>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            public_url: "http://127.0.0.1:3030/".to_string(),
            call_timeout: Duration::from_secs(10),
            hash_cost: HashCost::default(),
            pending_token_ttl: None,
        }
    }
}

/// The public view of a session, as handed to clients.
///
/// Internal storage metadata (store ids, revisions) never appears here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// The authenticated identity.
    pub identity: Identity,
    /// Base URL of the tenant's backing database behind the gateway.
    pub database_url: String,
    /// The session's public attributes.
    pub attrs: AttrBag,
}

/// Orchestrates login requests, token validation, and session access.
pub struct AuthBroker {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    config: BrokerConfig,
}

impl AuthBroker {
    /// Creates a broker over a store and a notifier.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Returns the public base URL the broker was configured with.
    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.config.public_url
    }

    /// Builds the URL delivered out-of-band for a login token.
    ///
    /// This is the only place the raw token leaves the process.
    #[must_use]
    pub fn delivery_url(&self, raw_token: &str, identity: &Identity, origin: &Origin) -> String {
        format!(
            "{}validate/?token={raw_token}&uid={}&host={}",
            self.config.public_url,
            urlencoding::encode(identity.as_str()),
            urlencoding::encode(origin.as_str())
        )
    }

    /// Handles a login request.
    ///
    /// Generates and hashes a fresh single-use token, attempts delivery,
    /// and persists the pending token, overwriting (revoking) any prior
    /// pending token for the same (identity, origin). Delivery failure is
    /// best-effort and non-fatal; storage failure is not.
    #[instrument(name = "broker.request_login", skip(self, details), fields(origin = %origin))]
    pub async fn request_login(
        &self,
        details: Map<String, Value>,
        origin: Origin,
    ) -> Result<(), AuthError> {
        let mut attrs = AttrBag::from_map(details);
        let identity = match attrs.take(IDENTITY_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => Identity::from(s),
            _ => return Err(AuthError::MissingIdentity),
        };
        tracing::debug!(identity = %identity, "login requested");

        let raw_token = generate_login_token();
        let token_hash = self.hash_blocking(raw_token.clone()).await?;
        let pending = PendingToken::new(identity.clone(), token_hash, origin.clone(), attrs);

        let url = self.delivery_url(&raw_token, &identity, &origin);
        match self
            .timed("notifier.send", self.notifier.send(&identity, &url))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(identity = %identity, error = %e, "token delivery failed");
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "token delivery timed out");
            }
        }

        let tenant = TenantId::derive(&identity, &origin);
        let token_id = PendingToken::store_id(&tenant);
        let existing = self.store_get("store.get_pending", &token_id).await?;
        let body = to_document_body(&pending)?;
        self.store_put(
            "store.put_pending",
            &token_id,
            existing.map(|doc| doc.revision),
            body,
        )
        .await?;

        tracing::info!(identity = %identity, "pending login token stored");
        Ok(())
    }

    /// Exchanges a raw token for an authenticated session.
    ///
    /// An absent pending token, an expired one, and a wrong token all
    /// fail with the same [`AuthError::Verification`] so callers cannot
    /// probe which identities have outstanding logins. On success the
    /// pending token's details are merged into the tenant's session and
    /// the pending token is deleted, conditioned on the revision read at
    /// the start of the pipeline.
    #[instrument(
        name = "broker.validate_token",
        skip(self, raw_token),
        fields(identity = %identity, origin = %origin)
    )]
    pub async fn validate_token(
        &self,
        identity: &Identity,
        origin: &Origin,
        raw_token: &str,
    ) -> Result<Origin, AuthError> {
        let tenant = TenantId::derive(identity, origin);
        let token_id = PendingToken::store_id(&tenant);

        let Some(doc) = self.store_get("store.get_pending", &token_id).await? else {
            return Err(AuthError::Verification);
        };
        let token_revision = doc.revision;
        let pending: PendingToken = from_document_body(doc.body)?;

        if let Some(ttl) = self.config.pending_token_ttl {
            if pending.is_expired(ttl) {
                tracing::debug!("pending token past its ttl");
                return Err(AuthError::Verification);
            }
        }

        let verified = self
            .verify_blocking(raw_token.to_string(), pending.token_hash().to_string())
            .await?;
        if !verified {
            // The pending token stays intact; nothing limits attempts.
            return Err(AuthError::Verification);
        }

        let session_id = UserSession::store_id(&tenant);
        let (mut session, session_revision) =
            match self.store_get("store.get_session", &session_id).await? {
                Some(doc) => {
                    let revision = doc.revision;
                    (from_document_body::<UserSession>(doc.body)?, Some(revision))
                }
                None => (
                    UserSession::new(identity.clone(), origin.clone()),
                    None,
                ),
            };
        session.merge(pending.attrs());
        let body = to_document_body(&session)?;
        self.store_put("store.put_session", &session_id, session_revision, body)
            .await?;

        // Single-use enforcement: delete conditioned on the revision read
        // in step 1. A concurrent validator that already consumed or
        // replaced the token turns up here as a conflict, which is an
        // ordinary verification failure.
        match self
            .timed(
                "store.delete_pending",
                self.store.delete(&token_id, token_revision),
            )
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(StoreError::Backend { details })) => {
                return Err(AuthError::Storage { details });
            }
            Ok(Err(_)) => return Err(AuthError::Verification),
            Err(timeout) => return Err(timeout),
        }

        tracing::info!("login token validated");
        Ok(origin.clone())
    }

    /// Returns the public view of a tenant's session.
    ///
    /// A session that was never written reads as an empty attribute set;
    /// reading does not create the document.
    pub async fn read_session(
        &self,
        identity: &Identity,
        origin: &Origin,
    ) -> Result<SessionView, AuthError> {
        let tenant = TenantId::derive(identity, origin);
        let session_id = UserSession::store_id(&tenant);
        let attrs = match self.store_get("store.get_session", &session_id).await? {
            Some(doc) => from_document_body::<UserSession>(doc.body)?.attrs().clone(),
            None => AttrBag::new(),
        };
        Ok(self.view(identity, &tenant, attrs))
    }

    /// Merges attributes into a tenant's session, creating it if absent.
    ///
    /// Reserved-prefix keys in `attrs` are dropped before the merge.
    /// Returns the merged public view.
    pub async fn write_session(
        &self,
        identity: &Identity,
        origin: &Origin,
        attrs: Map<String, Value>,
    ) -> Result<SessionView, AuthError> {
        let tenant = TenantId::derive(identity, origin);
        let session_id = UserSession::store_id(&tenant);
        let (mut session, revision) =
            match self.store_get("store.get_session", &session_id).await? {
                Some(doc) => {
                    let revision = doc.revision;
                    (from_document_body::<UserSession>(doc.body)?, Some(revision))
                }
                None => (
                    UserSession::new(identity.clone(), origin.clone()),
                    None,
                ),
            };
        session.merge(&AttrBag::from_map(attrs));
        let body = to_document_body(&session)?;
        self.store_put("store.put_session", &session_id, revision, body)
            .await?;

        Ok(self.view(identity, &tenant, session.attrs().clone()))
    }

    fn view(&self, identity: &Identity, tenant: &TenantId, attrs: AttrBag) -> SessionView {
        SessionView {
            identity: identity.clone(),
            database_url: format!("{}db/{}", self.config.public_url, tenant),
            attrs,
        }
    }

    /// Runs a future under the per-call timeout.
    async fn timed<F, T>(&self, operation: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.config.call_timeout, fut)
            .await
            .map_err(|_| AuthError::Timeout {
                operation: operation.to_string(),
            })
    }

    async fn store_get(
        &self,
        operation: &'static str,
        id: &str,
    ) -> Result<Option<keygate_store::Document>, AuthError> {
        self.timed(operation, self.store.get(id))
            .await?
            .map_err(storage)
    }

    async fn store_put(
        &self,
        operation: &'static str,
        id: &str,
        expected: Option<Revision>,
        body: Map<String, Value>,
    ) -> Result<Revision, AuthError> {
        self.timed(operation, self.store.put(id, expected, body))
            .await?
            .map_err(storage)
    }

    /// Hashes a token off the request path.
    async fn hash_blocking(&self, raw_token: String) -> Result<String, AuthError> {
        let cost = self.config.hash_cost.clone();
        let handle = tokio::task::spawn_blocking(move || hash_login_token(&raw_token, &cost));
        let joined = self.timed("token.hash", handle).await?;
        joined.map_err(|e| AuthError::Hash {
            details: e.to_string(),
        })?
    }

    /// Verifies a token off the request path.
    async fn verify_blocking(&self, raw_token: String, hash: String) -> Result<bool, AuthError> {
        let handle = tokio::task::spawn_blocking(move || verify_login_token(&raw_token, &hash));
        let joined = self.timed("token.verify", handle).await?;
        joined.map_err(|e| AuthError::Hash {
            details: e.to_string(),
        })
    }
}

fn storage(e: StoreError) -> AuthError {
    AuthError::Storage {
        details: e.to_string(),
    }
}

fn to_document_body<T: Serialize>(value: &T) -> Result<Map<String, Value>, AuthError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AuthError::Storage {
            details: "document body is not a JSON object".to_string(),
        }),
        Err(e) => Err(AuthError::Storage {
            details: e.to_string(),
        }),
    }
}

fn from_document_body<T: DeserializeOwned>(body: Map<String, Value>) -> Result<T, AuthError> {
    serde_json::from_value(Value::Object(body)).map_err(|e| AuthError::Storage {
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_notify::{NotifyError, RecordingNotifier};
    use keygate_store::MemoryStore;
    use serde_json::json;

    const ORIGIN_A: &str = "http://a/";
    const ORIGIN_B: &str = "http://b/";

    fn test_config() -> BrokerConfig {
        BrokerConfig {
            public_url: "http://127.0.0.1:3030/".to_string(),
            call_timeout: Duration::from_secs(5),
            hash_cost: HashCost::insecure_for_tests(),
            pending_token_ttl: None,
        }
    }

    fn broker() -> (Arc<RecordingNotifier>, AuthBroker) {
        broker_with_config(test_config())
    }

    fn broker_with_config(config: BrokerConfig) -> (Arc<RecordingNotifier>, AuthBroker) {
        let notifier = Arc::new(RecordingNotifier::new());
        let broker = AuthBroker::new(Arc::new(MemoryStore::new()), notifier.clone(), config);
        (notifier, broker)
    }

    fn details(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().expect("object literal").clone()
    }

    /// Pulls the raw token out of a recorded delivery URL.
    fn token_from_url(url: &str) -> String {
        let start = url.find("token=").expect("token param") + "token=".len();
        let rest = &url[start..];
        let end = rest.find('&').unwrap_or(rest.len());
        rest[..end].to_string()
    }

    async fn login(broker: &AuthBroker, notifier: &RecordingNotifier, email: &str) -> String {
        broker
            .request_login(details(json!({"email": email})), Origin::from(ORIGIN_A))
            .await
            .expect("login");
        token_from_url(&notifier.last_url_for(email).expect("delivery"))
    }

    #[tokio::test]
    async fn login_then_validate_succeeds() {
        let (notifier, broker) = broker();
        let token = login(&broker, &notifier, "dale@x.com").await;

        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);
        let validated = broker
            .validate_token(&identity, &origin, &token)
            .await
            .expect("validate");
        assert_eq!(validated, origin);
    }

    #[tokio::test]
    async fn delivery_url_has_the_documented_shape() {
        let (notifier, broker) = broker();
        broker
            .request_login(
                details(json!({"email": "dale@x.com"})),
                Origin::from(ORIGIN_A),
            )
            .await
            .expect("login");

        let url = notifier.last_url_for("dale@x.com").expect("delivery");
        let token = token_from_url(&url);
        assert_eq!(
            url,
            format!(
                "http://127.0.0.1:3030/validate/?token={token}&uid=dale%40x.com&host=http%3A%2F%2Fa%2F"
            )
        );
    }

    #[tokio::test]
    async fn second_login_revokes_the_first_token() {
        let (notifier, broker) = broker();
        let first = login(&broker, &notifier, "dale@x.com").await;
        let second = login(&broker, &notifier, "dale@x.com").await;
        assert_ne!(first, second);

        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);
        let err = broker
            .validate_token(&identity, &origin, &first)
            .await
            .expect_err("revoked token must fail");
        assert_eq!(err, AuthError::Verification);

        broker
            .validate_token(&identity, &origin, &second)
            .await
            .expect("current token validates");
    }

    #[tokio::test]
    async fn tokens_are_single_use() {
        let (notifier, broker) = broker();
        let token = login(&broker, &notifier, "dale@x.com").await;

        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);
        broker
            .validate_token(&identity, &origin, &token)
            .await
            .expect("first validation");
        let err = broker
            .validate_token(&identity, &origin, &token)
            .await
            .expect_err("second validation must fail");
        assert_eq!(err, AuthError::Verification);
    }

    #[tokio::test]
    async fn wrong_token_fails_and_leaves_pending_intact() {
        let (notifier, broker) = broker();
        let token = login(&broker, &notifier, "dale@x.com").await;

        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);
        let err = broker
            .validate_token(&identity, &origin, "0000deadbeef")
            .await
            .expect_err("wrong token");
        assert_eq!(err, AuthError::Verification);

        broker
            .validate_token(&identity, &origin, &token)
            .await
            .expect("real token still validates");
    }

    #[tokio::test]
    async fn validation_under_a_different_origin_fails() {
        let (notifier, broker) = broker();
        let token = login(&broker, &notifier, "dale@x.com").await;

        let identity = Identity::from("dale@x.com");
        let err = broker
            .validate_token(&identity, &Origin::from(ORIGIN_B), &token)
            .await
            .expect_err("wrong origin");
        assert_eq!(err, AuthError::Verification);
    }

    #[tokio::test]
    async fn absent_token_and_wrong_token_are_indistinguishable() {
        let (notifier, broker) = broker();
        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);

        let absent = broker
            .validate_token(&identity, &origin, "0000deadbeef")
            .await
            .expect_err("no pending token");

        login(&broker, &notifier, "dale@x.com").await;
        let wrong = broker
            .validate_token(&identity, &origin, "0000deadbeef")
            .await
            .expect_err("wrong token");

        assert_eq!(absent, wrong);
    }

    #[tokio::test]
    async fn login_details_flow_into_the_session() {
        let (notifier, broker) = broker();
        broker
            .request_login(
                details(json!({"email": "dale@x.com", "plan": "free", "_rev": "spoof"})),
                Origin::from(ORIGIN_A),
            )
            .await
            .expect("login");
        let token =
            token_from_url(&notifier.last_url_for("dale@x.com").expect("delivery"));

        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);
        broker
            .validate_token(&identity, &origin, &token)
            .await
            .expect("validate");

        let view = broker.read_session(&identity, &origin).await.expect("read");
        assert_eq!(view.attrs.get("plan"), Some(&json!("free")));
        assert!(view.attrs.get("_rev").is_none());
        assert!(view.attrs.get("email").is_none());
    }

    #[tokio::test]
    async fn missing_identity_field_is_rejected() {
        let (_notifier, broker) = broker();
        let err = broker
            .request_login(details(json!({"plan": "free"})), Origin::from(ORIGIN_A))
            .await
            .expect_err("no identity");
        assert_eq!(err, AuthError::MissingIdentity);
    }

    #[tokio::test]
    async fn read_session_for_unknown_tenant_is_empty() {
        let (_notifier, broker) = broker();
        let view = broker
            .read_session(&Identity::from("dale@x.com"), &Origin::from(ORIGIN_A))
            .await
            .expect("read");
        assert!(view.attrs.is_empty());
        assert_eq!(view.identity.as_str(), "dale@x.com");
    }

    #[tokio::test]
    async fn session_database_url_names_the_tenant() {
        let (_notifier, broker) = broker();
        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);
        let view = broker.read_session(&identity, &origin).await.expect("read");

        let tenant = TenantId::derive(&identity, &origin);
        assert_eq!(
            view.database_url,
            format!("http://127.0.0.1:3030/db/{tenant}")
        );
    }

    #[tokio::test]
    async fn write_session_merges_rather_than_replaces() {
        let (_notifier, broker) = broker();
        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);

        broker
            .write_session(&identity, &origin, details(json!({"a": 1})))
            .await
            .expect("first write");
        let view = broker
            .write_session(&identity, &origin, details(json!({"b": 2})))
            .await
            .expect("second write");

        assert_eq!(view.attrs.get("a"), Some(&json!(1)));
        assert_eq!(view.attrs.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn write_session_drops_reserved_keys() {
        let (_notifier, broker) = broker();
        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);

        let view = broker
            .write_session(&identity, &origin, details(json!({"_id": "spoof", "a": 1})))
            .await
            .expect("write");
        assert!(view.attrs.get("_id").is_none());
        assert_eq!(view.attrs.get("a"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_origin() {
        let (_notifier, broker) = broker();
        let identity = Identity::from("dale@x.com");

        broker
            .write_session(&identity, &Origin::from(ORIGIN_A), details(json!({"a": 1})))
            .await
            .expect("write under a");
        let view = broker
            .read_session(&identity, &Origin::from(ORIGIN_B))
            .await
            .expect("read under b");
        assert!(view.attrs.is_empty());
    }

    #[tokio::test]
    async fn session_attributes_survive_a_fresh_login_cycle() {
        let (notifier, broker) = broker();
        let identity = Identity::from("dale@x.com");
        let origin = Origin::from(ORIGIN_A);

        broker
            .write_session(&identity, &origin, details(json!({"color": "teal"})))
            .await
            .expect("write");

        // A later login and validation for the same tenant merges into the
        // same surviving document.
        let token = login(&broker, &notifier, "dale@x.com").await;
        broker
            .validate_token(&identity, &origin, &token)
            .await
            .expect("validate");

        let view = broker.read_session(&identity, &origin).await.expect("read");
        assert_eq!(view.attrs.get("color"), Some(&json!("teal")));
    }

    #[tokio::test]
    async fn expired_pending_token_fails_validation() {
        let mut config = test_config();
        config.pending_token_ttl = Some(TokenTtl::zero());
        let (notifier, broker) = broker_with_config(config);
        let token = login(&broker, &notifier, "dale@x.com").await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        let err = broker
            .validate_token(
                &Identity::from("dale@x.com"),
                &Origin::from(ORIGIN_A),
                &token,
            )
            .await
            .expect_err("expired token");
        assert_eq!(err, AuthError::Verification);
    }

    struct FailingNotifier;

    #[async_trait::async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _identity: &Identity, _url: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Transport {
                details: "mailbox on fire".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn delivery_failure_does_not_fail_the_login() {
        let broker = AuthBroker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FailingNotifier),
            test_config(),
        );
        broker
            .request_login(
                details(json!({"email": "dale@x.com"})),
                Origin::from(ORIGIN_A),
            )
            .await
            .expect("login must succeed despite delivery failure");
    }
}
