//! Out-of-band login token delivery for keygate.
//!
//! This crate provides:
//! - The [`Notifier`] trait: deliver a token-carrying login URL to an
//!   identity's out-of-band address
//! - [`SmtpNotifier`]: email delivery over lettre's async SMTP transport
//! - [`NoopNotifier`]: the unconfigured-transport path, succeeding
//!   without delivering
//! - [`RecordingNotifier`]: a test double that captures deliveries, so
//!   tests read issued tokens from here instead of from any process-local
//!   cache
//!
//! Delivery is best-effort by contract: the broker logs and swallows
//! failures rather than failing a login request over them.

pub mod error;
pub mod smtp;

pub use error::NotifyError;
pub use smtp::{SmtpConfig, SmtpNotifier};

use async_trait::async_trait;
use keygate_core::Identity;
use std::sync::Mutex;

/// Delivers a login URL to an identity's out-of-band address.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `url` to the address `identity` designates.
    ///
    /// This is the only point at which a raw login token leaves the
    /// process; implementations must not log the URL above debug level.
    async fn send(&self, identity: &Identity, url: &str) -> Result<(), NotifyError>;
}

/// Notifier used when no transport is configured.
///
/// Succeeds with delivery simply skipped, so login flows keep working in
/// development setups where the operator reads tokens from elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, identity: &Identity, _url: &str) -> Result<(), NotifyError> {
        tracing::debug!(identity = %identity, "no delivery transport configured, skipping");
        Ok(())
    }
}

/// A recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The identity the URL was addressed to.
    pub identity: String,
    /// The delivered login URL.
    pub url: String,
}

/// Test double that records deliveries instead of sending them.
///
/// Tests inject this where production wires an [`SmtpNotifier`], then
/// read the issued login URL back out.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Delivery>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded delivery, oldest first.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    /// Returns the most recently delivered URL for an identity.
    #[must_use]
    pub fn last_url_for(&self, identity: &str) -> Option<String> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .iter()
            .rev()
            .find(|delivery| delivery.identity == identity)
            .map(|delivery| delivery.url.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, identity: &Identity, url: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(Delivery {
                identity: identity.to_string(),
                url: url.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_notifier_always_succeeds() {
        let notifier = NoopNotifier;
        notifier
            .send(&Identity::from("dale@example.com"), "https://x/validate/?token=t")
            .await
            .expect("noop send");
    }

    #[tokio::test]
    async fn recording_notifier_captures_deliveries_in_order() {
        let notifier = RecordingNotifier::new();
        notifier
            .send(&Identity::from("dale@example.com"), "url-one")
            .await
            .expect("send");
        notifier
            .send(&Identity::from("dale@example.com"), "url-two")
            .await
            .expect("send");
        notifier
            .send(&Identity::from("erin@example.com"), "url-three")
            .await
            .expect("send");

        assert_eq!(notifier.deliveries().len(), 3);
        assert_eq!(
            notifier.last_url_for("dale@example.com").as_deref(),
            Some("url-two")
        );
        assert_eq!(
            notifier.last_url_for("erin@example.com").as_deref(),
            Some("url-three")
        );
        assert!(notifier.last_url_for("nobody@example.com").is_none());
    }
}
