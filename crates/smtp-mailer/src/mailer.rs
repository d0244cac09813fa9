//! Email Sending
//!
//! Uses SMTP via lettre. One pooled transport is built at startup and shared
//! by every concurrent send.

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::credentials::{CredentialsProvider, StaticCredentials};
use crate::error::{MailError, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info, warn};

/// One outgoing plain-text message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

impl EmailRequest {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            cc: None,
            bcc: None,
        }
    }

    pub fn with_cc(mut self, cc: impl Into<String>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    /// Cc address, ignoring blank values
    pub fn cc_address(&self) -> Option<&str> {
        non_blank(self.cc.as_deref())
    }

    /// Bcc address, ignoring blank values
    pub fn bcc_address(&self) -> Option<&str> {
        non_blank(self.bcc.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// What the relay answered for an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub code: String,
    pub message: String,
}

impl SendReceipt {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Delivers a single message, blocking the caller until the relay answers
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, request: &EmailRequest) -> Result<SendReceipt>;
}

/// lettre-backed mailer
pub struct SmtpMailer {
    sender: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the transport from configuration. Must run inside a tokio runtime.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        Self::with_credentials(config, &StaticCredentials::from_config(config))
    }

    pub fn with_credentials(
        config: &SmtpConfig,
        credentials: &dyn CredentialsProvider,
    ) -> Result<Self> {
        let builder = match config.security() {
            SmtpSecurity::ImplicitTls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Setup(e.to_string()))?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| MailError::Setup(e.to_string()))?
            }
            SmtpSecurity::Plain => {
                warn!(host = %config.host, "SMTP connection is not encrypted");
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            }
        };

        let transport = builder
            .port(config.port)
            .credentials(credentials.credentials())
            .timeout(Some(config.timeout()))
            .build();

        debug!(
            host = %config.host,
            port = config.port,
            security = ?config.security(),
            "SMTP transport ready"
        );

        Ok(Self {
            sender: config.username.clone(),
            transport,
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, request: &EmailRequest) -> Result<SendReceipt> {
        let message = build_message(&self.sender, request)?;

        let response = self.transport.send(message).await?;
        let receipt = SendReceipt::new(
            response.code().to_string(),
            response.message().collect::<Vec<&str>>().join(" "),
        );

        info!(to = %request.to, code = %receipt.code, "Email accepted by relay");
        Ok(receipt)
    }
}

/// Assemble a plain-text message. Blank cc/bcc values are skipped.
pub fn build_message(sender: &str, request: &EmailRequest) -> Result<Message> {
    let mut builder = Message::builder()
        .from(parse_mailbox(sender)?)
        .to(parse_mailbox(&request.to)?)
        .subject(request.subject.as_str());

    if let Some(cc) = request.cc_address() {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    if let Some(bcc) = request.bcc_address() {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }

    let message = builder
        .header(ContentType::TEXT_PLAIN)
        .body(request.body.clone())?;
    Ok(message)
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| MailError::invalid_address(address, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Toggle;

    const SENDER: &str = "bot@example.com";

    #[test]
    fn test_build_message_minimal() {
        let request = EmailRequest::new("a@example.com", "Hi", "Hello");
        let message = build_message(SENDER, &request).unwrap();

        assert_eq!(message.envelope().to().len(), 1);
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hi"));
        assert!(raw.contains("Hello"));
        assert!(!raw.contains("Cc:"));
    }

    #[test]
    fn test_build_message_with_cc_and_bcc() {
        let request = EmailRequest::new("a@example.com", "Hi", "Hello")
            .with_cc("c@example.com")
            .with_bcc("b@example.com");
        let message = build_message(SENDER, &request).unwrap();

        assert_eq!(message.envelope().to().len(), 3);
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Cc: c@example.com"));
        // Bcc only lives in the envelope
        assert!(!raw.contains("b@example.com"));
    }

    #[test]
    fn test_blank_cc_is_ignored() {
        let request = EmailRequest::new("a@example.com", "Hi", "Hello")
            .with_cc("   ")
            .with_bcc("");
        assert_eq!(request.cc_address(), None);
        assert_eq!(request.bcc_address(), None);

        let message = build_message(SENDER, &request).unwrap();
        assert_eq!(message.envelope().to().len(), 1);
    }

    #[test]
    fn test_invalid_recipient() {
        let request = EmailRequest::new("not-an-address", "Hi", "Hello");
        let err = build_message(SENDER, &request).unwrap_err();
        assert_eq!(err.kind(), "InvalidAddress");
    }

    #[test]
    fn test_missing_sender_is_invalid_address() {
        let request = EmailRequest::new("a@example.com", "Hi", "Hello");
        let err = build_message("", &request).unwrap_err();
        assert_eq!(err.kind(), "InvalidAddress");
    }

    #[tokio::test]
    async fn test_mailer_builds_for_every_security_mode() {
        for (ssl, tls) in [(true, false), (false, true), (false, false)] {
            let config = SmtpConfig {
                username: SENDER.into(),
                password: "secret".into(),
                ssl: Toggle { enabled: ssl },
                tls: Toggle { enabled: tls },
                ..Default::default()
            };
            let mailer = SmtpMailer::new(&config).unwrap();
            assert_eq!(mailer.sender(), SENDER);
        }
    }

    #[tokio::test]
    async fn test_invalid_address_fails_before_connecting() {
        let config = SmtpConfig {
            username: SENDER.into(),
            password: "secret".into(),
            host: "127.0.0.1".into(),
            port: 1,
            tls: Toggle::OFF,
            ..Default::default()
        };
        let mailer = SmtpMailer::new(&config).unwrap();

        let err = mailer
            .send(&EmailRequest::new("broken", "Hi", "Hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidAddress");
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_connection_failure() {
        let config = SmtpConfig {
            username: SENDER.into(),
            password: "secret".into(),
            host: "127.0.0.1".into(),
            port: 1,
            tls: Toggle::OFF,
            timeout_secs: 2,
            ..Default::default()
        };
        let mailer = SmtpMailer::new(&config).unwrap();

        let err = mailer
            .send(&EmailRequest::new("a@example.com", "Hi", "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Connection(_) | MailError::Timeout(_)));
    }
}
