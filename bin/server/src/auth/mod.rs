//! Authentication module for the keygate gateway.
//!
//! This module provides:
//! - The login, validation, session, and logout routes
//! - The signed session cookie and the `RequireAuth` extractor gating
//!   `/session/` and `/db/*`
//!
//! # Authorization Model
//!
//! The signed cookie payload is the sole source of truth for "who is
//! authenticated": there is no server-side session table beyond the
//! per-tenant session document. Because the authenticating fact lives in
//! the cookie, authentication survives process restarts as long as the
//! signing key is stable, which is why the key is mandatory
//! configuration rather than a baked-in constant.

pub mod middleware;
pub mod routes;

pub use middleware::{AuthRejection, RequireAuth, SESSION_COOKIE};

use crate::config::CookieConfig;
use crate::proxy::TenantProxy;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use keygate_access::AuthBroker;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    /// The auth broker.
    pub broker: AuthBroker,
    /// Cookie flags and lifetime.
    pub cookie: CookieConfig,
    /// Key the session cookie is signed with.
    pub cookie_key: Key,
    /// Tenant database proxy.
    pub proxy: TenantProxy,
}

impl AppState {
    /// Creates a new application state, deriving the cookie signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured signing secret is too short.
    pub fn new(
        broker: AuthBroker,
        cookie: CookieConfig,
        proxy: TenantProxy,
    ) -> Result<Self, config::ConfigError> {
        let cookie_key = cookie.key()?;
        Ok(Self {
            broker,
            cookie,
            cookie_key,
            proxy,
        })
    }
}

impl FromRef<Arc<AppState>> for Key {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.cookie_key.clone()
    }
}
