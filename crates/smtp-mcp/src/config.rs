//! Server Configuration
//!
//! Layered with the `config` crate, lowest precedence first:
//! built-in defaults, a Java-style `.properties` file, then
//! `SMTP_MCP_<SECTION>__<KEY>` environment variables.

use config::{Config, ConfigError, Environment, Map, Source, Value};
use serde::Deserialize;
use smtp_mailer::config::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT, DEFAULT_TIMEOUT_SECS};
use smtp_mailer::SmtpConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "application.properties";
pub const ENV_PREFIX: &str = "SMTP_MCP";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 200;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_bind_host() -> String {
    DEFAULT_BIND_HOST.to_string()
}

fn default_http_port() -> u16 {
    crate::DEFAULT_HTTP_PORT
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_http_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Immutable process-wide settings, built once before any transport starts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Settings {
    /// Load defaults, then `path` (if it exists), then the environment.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let properties = PropertiesSource::read(path)?;
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__");
        Self::build(properties, Some(env))
    }

    /// Defaults overlaid with inline properties text. Ignores the environment.
    pub fn from_properties(text: &str) -> Result<Self, SettingsError> {
        Self::build(Some(PropertiesSource::parse("<inline>", text)), None)
    }

    fn build(
        properties: Option<PropertiesSource>,
        env: Option<Environment>,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("smtp.host", DEFAULT_SMTP_HOST)?
            .set_default("smtp.port", i64::from(DEFAULT_SMTP_PORT))?
            .set_default("smtp.ssl.enabled", false)?
            .set_default("smtp.tls.enabled", true)?
            .set_default("smtp.username", "")?
            .set_default("smtp.password", "")?
            .set_default("smtp.timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("server.host", DEFAULT_BIND_HOST)?
            .set_default("server.port", i64::from(crate::DEFAULT_HTTP_PORT))?
            .set_default(
                "server.max_concurrent_requests",
                DEFAULT_MAX_CONCURRENT_REQUESTS as u64,
            )?;

        if let Some(properties) = properties {
            builder = builder.add_source(properties);
        }
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.smtp.host.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "smtp.host",
                reason: "must not be empty".into(),
            });
        }
        if self.server.max_concurrent_requests == 0 {
            return Err(SettingsError::Invalid {
                key: "server.max_concurrent_requests",
                reason: "must be at least 1".into(),
            });
        }
        if !self.smtp.has_credentials() {
            warn!("smtp.username/smtp.password not set, sending will likely fail");
        }
        Ok(())
    }
}

/// A parsed `.properties` file as a `config` source.
///
/// Dotted keys (`smtp.ssl.enabled`) nest the same way the other layers do.
#[derive(Debug, Clone)]
pub struct PropertiesSource {
    origin: String,
    entries: Vec<(String, String)>,
}

impl PropertiesSource {
    pub fn parse(origin: impl Into<String>, text: &str) -> Self {
        Self {
            origin: origin.into(),
            entries: parse_properties(text),
        }
    }

    /// `Ok(None)` when the file does not exist
    pub fn read(path: &Path) -> Result<Option<Self>, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let source = Self::parse(path.display().to_string(), &text);
                info!(
                    path = %path.display(),
                    keys = source.entries.len(),
                    "Loaded configuration file"
                );
                Ok(Some(source))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Configuration file not found, using defaults");
                Ok(None)
            }
            Err(source) => Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl Source for PropertiesSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let mut map = Map::new();
        for (key, value) in &self.entries {
            debug!(key = %key, "properties entry");
            map.insert(key.clone(), Value::new(Some(&self.origin), value.clone()));
        }
        Ok(map)
    }
}

/// Parse Java `.properties` text into ordered key/value pairs.
///
/// Handles `=`, `:` and whitespace separators, `#`/`!` comments and
/// backslash line continuation. Later duplicates win when collected.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut logical = String::new();
    let mut continuing = false;

    for raw in text.lines() {
        let line = raw.trim_start();
        if !continuing && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        if ends_with_continuation(line) {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }

        logical.push_str(line);
        entries.extend(split_entry(&logical));
        logical.clear();
        continuing = false;
    }

    if continuing {
        entries.extend(split_entry(&logical));
    }
    entries
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let mut escaped = false;
    let mut split = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                split = i;
                break;
            }
            c if c.is_whitespace() => {
                split = i;
                break;
            }
            _ => {}
        }
    }

    let key = unescape(&line[..split]);
    if key.is_empty() {
        return None;
    }
    let rest = line[split..].trim_start();
    let rest = rest.strip_prefix(|c: char| c == '=' || c == ':').unwrap_or(rest);
    Some((key, unescape(rest.trim())))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
