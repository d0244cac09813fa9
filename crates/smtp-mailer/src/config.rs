//! SMTP Settings
//!
//! Deserialized from the `smtp.*` keys of the server configuration. The value
//! is built once at startup and never mutated afterwards.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Nested `enabled` flag (`smtp.ssl.enabled`, `smtp.tls.enabled`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Toggle {
    #[serde(default)]
    pub enabled: bool,
}

impl Toggle {
    pub const ON: Toggle = Toggle { enabled: true };
    pub const OFF: Toggle = Toggle { enabled: false };
}

/// How the connection to the relay is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (SMTPS, usually port 465)
    ImplicitTls,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    StartTls,
    /// No encryption at all
    Plain,
}

#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: Toggle,
    #[serde(default = "default_tls")]
    pub tls: Toggle,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    DEFAULT_SMTP_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_tls() -> Toggle {
    Toggle::ON
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            host: default_host(),
            port: default_port(),
            ssl: Toggle::OFF,
            tls: default_tls(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SmtpConfig {
    /// SSL wins over TLS when both are switched on.
    pub fn security(&self) -> SmtpSecurity {
        if self.ssl.enabled {
            SmtpSecurity::ImplicitTls
        } else if self.tls.enabled {
            SmtpSecurity::StartTls
        } else {
            SmtpSecurity::Plain
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Both username and password are set
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl.enabled)
            .field("tls", &self.tls.enabled)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
