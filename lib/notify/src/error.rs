//! Error types for the notify crate.

use std::fmt;

/// Errors from delivery operations.
///
/// The broker treats every variant as best-effort: a failed delivery is
/// logged and swallowed, never fatal to the login pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The recipient or sender address could not be parsed.
    Address { details: String },
    /// The transport rejected or failed to carry the message.
    Transport { details: String },
    /// The transport could not be constructed from its configuration.
    Config { details: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address { details } => {
                write!(f, "invalid delivery address: {details}")
            }
            Self::Transport { details } => {
                write!(f, "delivery transport error: {details}")
            }
            Self::Config { details } => {
                write!(f, "invalid delivery configuration: {details}")
            }
        }
    }
}

impl std::error::Error for NotifyError {}
