//! Session configuration: endpoint, database and credentials.
//!
//! Sources, lowest precedence first:
//! - a JSON file (`ODOO_CONFIG`, or `./odoo_config.json` when present)
//! - environment variables `ODOO_URL`, `ODOO_DB`, `ODOO_USERNAME`,
//!   `ODOO_PASSWORD`, `ODOO_TIMEOUT` (seconds), `ODOO_RETRIES` (attempts)

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::retry::RetryPolicy;

const DEFAULT_CONFIG_FILE: &str = "odoo_config.json";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("cannot read config file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("cannot parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Credentials supplied once per process lifetime.
pub struct Credentials {
    pub endpoint: Url,
    pub database: String,
    pub username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(
        endpoint: Url,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            database: database.into(),
            username: username.into(),
            password: SecretString::new(password.into().into_boxed_str()),
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint.as_str())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Everything the session client needs at authentication time.
#[derive(Debug)]
pub struct SessionConfig {
    pub credentials: Credentials,
    /// Per remote call.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl SessionConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load from the config file (if any) overlaid with the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var("ODOO_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        let mut partial = match file {
            Some(path) => PartialConfig::from_file(&path)?,
            None => PartialConfig::default(),
        };
        partial.overlay(PartialConfig::from_lookup(|k| std::env::var(k).ok()));
        partial.finish()
    }

    /// Load from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Load from an arbitrary key lookup (environment-shaped keys).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        PartialConfig::from_lookup(lookup).finish()
    }

    /// Load from a JSON file with keys `url`, `db`, `username`, `password`
    /// and optional `timeout` / `retries`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        PartialConfig::from_file(path.as_ref())?.finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    url: Option<String>,
    db: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<u64>,
    retries: Option<u32>,
}

impl PartialConfig {
    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Unparseable numbers are read as 0 so `finish` reports them as invalid.
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        Self {
            url: non_empty("ODOO_URL"),
            db: non_empty("ODOO_DB"),
            username: non_empty("ODOO_USERNAME"),
            password: non_empty("ODOO_PASSWORD"),
            timeout: non_empty("ODOO_TIMEOUT").map(|v| v.trim().parse().unwrap_or(0)),
            retries: non_empty("ODOO_RETRIES").map(|v| v.trim().parse().unwrap_or(0)),
        }
    }

    fn overlay(&mut self, other: PartialConfig) {
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.db.is_some() {
            self.db = other.db;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.retries.is_some() {
            self.retries = other.retries;
        }
    }

    fn finish(self) -> Result<SessionConfig, ConfigError> {
        let raw_url = self.url.ok_or(ConfigError::Missing("ODOO_URL"))?;
        let endpoint = Url::parse(raw_url.trim()).map_err(|e| ConfigError::Invalid {
            field: "ODOO_URL",
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "ODOO_URL",
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }
        let database = self.db.ok_or(ConfigError::Missing("ODOO_DB"))?;
        let username = self.username.ok_or(ConfigError::Missing("ODOO_USERNAME"))?;
        let password = self.password.ok_or(ConfigError::Missing("ODOO_PASSWORD"))?;

        let mut config = SessionConfig::new(Credentials::new(endpoint, database, username, password));

        if let Some(secs) = self.timeout {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "ODOO_TIMEOUT",
                    reason: "must be a positive number of seconds".to_string(),
                });
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = self.retries {
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    field: "ODOO_RETRIES",
                    reason: "must allow at least one attempt".to_string(),
                });
            }
            config.retry = config.retry.with_max_attempts(attempts);
        }
        Ok(config)
    }
}
