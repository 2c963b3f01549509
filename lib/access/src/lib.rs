//! Passwordless login broker and session model for keygate.
//!
//! This crate provides:
//! - Login token generation and Argon2id hashing (`token`)
//! - The pending-token and user-session documents (`session`)
//! - Caller-supplied attribute bags with a reserved-key blocklist
//!   (`attrs`)
//! - The [`AuthBroker`] orchestrating the request-login and
//!   validate-token pipelines plus session read/write (`broker`)
//!
//! # Access Model
//!
//! There are no passwords and no accounts to enroll. Any identity may
//! request a login at any time; possession of the delivered single-use
//! token *is* the authentication. All state is scoped to the
//! (identity, origin) pair, so two applications sharing this broker can
//! never observe each other's sessions or data.
//!
//! # Example
//!
//! ```no_run
//! use keygate_access::{AuthBroker, BrokerConfig};
//! use keygate_core::{Identity, Origin};
//! use keygate_notify::NoopNotifier;
//! use keygate_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), keygate_access::AuthError> {
//! let broker = AuthBroker::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NoopNotifier),
//!     BrokerConfig::default(),
//! );
//!
//! let mut details = serde_json::Map::new();
//! details.insert("email".into(), "dale@example.com".into());
//! broker.request_login(details, Origin::from("http://app/")).await?;
//!
//! // ... the raw token reaches the user out-of-band ...
//! # let token = String::new();
//! let origin = broker
//!     .validate_token(&Identity::from("dale@example.com"), &Origin::from("http://app/"), &token)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod attrs;
pub mod broker;
pub mod error;
pub mod session;
pub mod token;

pub use attrs::{AttrBag, RESERVED_PREFIX};
pub use broker::{AuthBroker, BrokerConfig, SessionView, IDENTITY_FIELD};
pub use error::AuthError;
pub use session::{PendingToken, UserSession};
pub use token::{
    generate_login_token, hash_login_token, verify_login_token, HashCost, LOGIN_TOKEN_BYTES,
};
