//! Error types for mail delivery

use lettre::transport::smtp;
use std::fmt::Display;
use thiserror::Error;

/// Failure reported by a [`Mailer`](crate::Mailer)
///
/// Every variant maps to a stable tag via [`MailError::kind`], which callers
/// surface as `errorType` in the result envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    MessageBuild(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Transport setup failed: {0}")]
    Setup(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, MailError>;

/// Reply codes that mean the relay refused our credentials
const AUTH_REPLY_CODES: &[&str] = &["454", "530", "534", "535", "538"];

impl MailError {
    /// Stable tag for this failure
    pub fn kind(&self) -> &'static str {
        match self {
            MailError::InvalidAddress { .. } => "InvalidAddress",
            MailError::MessageBuild(_) => "MessageBuildError",
            MailError::Authentication(_) => "AuthenticationFailed",
            MailError::Connection(_) => "ConnectionFailed",
            MailError::Tls(_) => "TlsFailure",
            MailError::Timeout(_) => "Timeout",
            MailError::Rejected(_) => "Rejected",
            MailError::Setup(_) => "TransportSetup",
        }
    }

    pub fn invalid_address(address: &str, reason: impl Display) -> Self {
        MailError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        MailError::Authentication(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        MailError::Connection(msg.into())
    }
}

impl From<smtp::Error> for MailError {
    fn from(err: smtp::Error) -> Self {
        let message = err.to_string();

        if err.is_timeout() {
            return MailError::Timeout(message);
        }
        if err.is_tls() {
            return MailError::Tls(message);
        }
        if let Some(code) = err.status() {
            let code = code.to_string();
            if AUTH_REPLY_CODES.contains(&code.as_str()) {
                return MailError::Authentication(message);
            }
            return MailError::Rejected(message);
        }
        if err.is_client() {
            // lettre reports "no compatible mechanism" and friends as client errors
            if message.to_lowercase().contains("auth") {
                return MailError::Authentication(message);
            }
            return MailError::Rejected(message);
        }
        if err.is_permanent() || err.is_transient() || err.is_response() {
            return MailError::Rejected(message);
        }

        MailError::Connection(message)
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::MessageBuild(err.to_string())
    }
}
