//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the gateway,
//! loaded via the `config` crate from `KEYGATE__`-prefixed environment
//! variables (`__` separates nesting levels, e.g.
//! `KEYGATE__COOKIE__SIGNING_KEY`).

use axum_extra::extract::cookie::Key;
use keygate_access::{BrokerConfig, HashCost};
use keygate_notify::SmtpConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Public base URL this gateway is reachable on, with trailing slash.
    /// Embedded in delivery URLs and session `db` URLs.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// PostgreSQL connection URL for the token/session store. When unset
    /// the gateway keeps documents in process memory and forgets them on
    /// restart.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Session cookie configuration. The signing key has no default.
    pub cookie: CookieConfig,

    /// Broker configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Tenant database proxy configuration.
    #[serde(default)]
    pub tenant: TenantConfig,

    /// SMTP transport for token delivery. When unset, delivery is
    /// skipped and logins still succeed.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

fn default_public_url() -> String {
    "http://127.0.0.1:3030/".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3030".to_string()
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    /// Secret the session cookie is signed with. Mandatory, minimum 32
    /// bytes; rotating it invalidates every outstanding session.
    pub signing_key: String,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local
    /// HTTP development.
    #[serde(default = "default_cookie_secure")]
    pub secure: bool,

    /// Cookie max age in days.
    #[serde(default = "default_cookie_max_age_days")]
    pub max_age_days: i64,
}

fn default_cookie_secure() -> bool {
    true
}

fn default_cookie_max_age_days() -> i64 {
    30
}

impl CookieConfig {
    /// Derives the cookie signing key from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn key(&self) -> Result<Key, config::ConfigError> {
        if self.signing_key.len() < 32 {
            return Err(config::ConfigError::Message(
                "cookie signing key must be at least 32 bytes".to_string(),
            ));
        }
        Ok(Key::derive_from(self.signing_key.as_bytes()))
    }
}

/// Broker-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Timeout in seconds applied to each hash, store, and delivery call
    /// individually.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Argon2id work factor for login token hashing.
    #[serde(default)]
    pub hash_cost: HashCost,

    /// Optional pending-token expiry in minutes. Unset means tokens
    /// persist until the next login request overwrites them.
    #[serde(default)]
    pub pending_token_ttl_minutes: Option<i64>,
}

fn default_call_timeout_secs() -> u64 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            hash_cost: HashCost::default(),
            pending_token_ttl_minutes: None,
        }
    }
}

/// Tenant database proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    /// Base URL of the document database server tenant requests are
    /// forwarded to, with trailing slash.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Prefix applied to tenant database names, so several keygate
    /// deployments can share one storage cluster.
    #[serde(default)]
    pub prefix: String,

    /// Admin username the gateway provisions and forwards with.
    #[serde(default)]
    pub admin_username: Option<String>,

    /// Admin password the gateway provisions and forwards with.
    #[serde(default)]
    pub admin_password: Option<String>,
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:5984/".to_string()
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            upstream_url: default_upstream_url(),
            prefix: String::new(),
            admin_username: None,
            admin_password: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `KEYGATE__`-prefixed environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("KEYGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builds the broker configuration from this server configuration.
    #[must_use]
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            public_url: self.public_url.clone(),
            call_timeout: Duration::from_secs(self.auth.call_timeout_secs),
            hash_cost: self.auth.hash_cost.clone(),
            pending_token_ttl: self
                .auth
                .pending_token_ttl_minutes
                .map(chrono_minutes),
        }
    }
}

fn chrono_minutes(minutes: i64) -> chrono::Duration {
    chrono::Duration::minutes(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_has_correct_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.call_timeout_secs, 10);
        assert!(config.pending_token_ttl_minutes.is_none());
    }

    #[test]
    fn cookie_key_requires_a_long_enough_secret() {
        let short = CookieConfig {
            signing_key: "too short".to_string(),
            secure: true,
            max_age_days: 30,
        };
        assert!(short.key().is_err());

        let long = CookieConfig {
            signing_key: "0123456789abcdef0123456789abcdef".to_string(),
            secure: true,
            max_age_days: 30,
        };
        assert!(long.key().is_ok());
    }

    #[test]
    fn tenant_config_defaults_to_local_upstream() {
        let config = TenantConfig::default();
        assert_eq!(config.upstream_url, "http://127.0.0.1:5984/");
        assert!(config.prefix.is_empty());
    }
}
