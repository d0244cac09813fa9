//! smtp-mailer: Outbound Mail for the SMTP MCP Server
//!
//! Wraps lettre's async SMTP transport behind the [`Mailer`] trait so the
//! protocol front end never touches SMTP details or raw transport errors.
//!
//! ```text
//! SmtpConfig ──► SmtpMailer::new ──► AsyncSmtpTransport (pooled, shared)
//!                     │
//! EmailRequest ──► Mailer::send ──► Ok(SendReceipt) | Err(MailError { kind })
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod mailer;

// Re-export main types
pub use config::{SmtpConfig, SmtpSecurity, Toggle};
pub use credentials::{CredentialsProvider, StaticCredentials};
pub use error::{MailError, Result};
pub use mailer::{build_message, EmailRequest, Mailer, SendReceipt, SmtpMailer};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{EmailRequest, MailError, Mailer, SendReceipt, SmtpConfig, SmtpMailer};
}
