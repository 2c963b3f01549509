//! SMTP delivery over lettre's async transport.

use crate::error::NotifyError;
use crate::Notifier;
use async_trait::async_trait;
use keygate_core::Identity;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;

/// SMTP transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,

    /// SMTP server port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Username for SMTP authentication.
    pub username: String,

    /// Password for SMTP authentication.
    pub password: String,

    /// Sender address for login mails.
    pub from_address: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Delivers login URLs by email.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    /// Public host of the gateway, named in the mail subject.
    subject_host: String,
}

impl SmtpNotifier {
    /// Builds a notifier from SMTP configuration.
    ///
    /// Uses STARTTLS against the configured relay. The transport is
    /// constructed once and reused across deliveries.
    pub fn new(config: &SmtpConfig, subject_host: String) -> Result<Self, NotifyError> {
        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address {
                details: e.to_string(),
            })?;

        let credentials =
            Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Config {
                details: e.to_string(),
            })?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from,
            subject_host,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, identity: &Identity, url: &str) -> Result<(), NotifyError> {
        let to = identity
            .as_str()
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address {
                details: e.to_string(),
            })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Login for {}", self.subject_host))
            .header(ContentType::TEXT_PLAIN)
            .body(format!("Hello!\nAccess your account here: {url}"))
            .map_err(|e| NotifyError::Transport {
                details: e.to_string(),
            })?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport {
                details: e.to_string(),
            })?;

        tracing::debug!(identity = %identity, "login mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: "secret".to_string(),
            from_address: "login@example.com".to_string(),
        }
    }

    #[test]
    fn builds_from_valid_config() {
        let notifier = SmtpNotifier::new(&config(), "https://keygate.example.com/".to_string());
        assert!(notifier.is_ok());
    }

    #[test]
    fn rejects_unparseable_from_address() {
        let mut bad = config();
        bad.from_address = "not an address".to_string();
        let err = SmtpNotifier::new(&bad, "https://keygate.example.com/".to_string())
            .expect_err("must fail");
        assert!(matches!(err, NotifyError::Address { .. }));
    }

    #[tokio::test]
    async fn rejects_unparseable_recipient() {
        let notifier =
            SmtpNotifier::new(&config(), "https://keygate.example.com/".to_string())
                .expect("build");
        let err = notifier
            .send(&Identity::from("not an address"), "https://x/validate/?token=t")
            .await
            .expect_err("must fail");
        assert!(matches!(err, NotifyError::Address { .. }));
    }
}
