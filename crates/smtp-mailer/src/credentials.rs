//! SMTP credentials

use crate::config::SmtpConfig;
use lettre::transport::smtp::authentication::Credentials;
use std::fmt;

/// Supplies the username/password pair used to authenticate against the relay
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Credentials;
}

/// Fixed credentials resolved once from configuration
#[derive(Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &SmtpConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
