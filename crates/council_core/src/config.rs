//! Host configuration resolved from the process environment.
//!
//! # Responsibility
//! - Resolve the vault secret, database path and logging settings once at
//!   startup.
//!
//! # Invariants
//! - A missing, blank or well-known development secret is a startup error;
//!   the host never derives vault keys from a built-in constant.
//! - `Debug` output never contains the secret.

use crate::logging::LogLevel;
use secrecy::SecretString;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const APP_SECRET_ENV: &str = "APP_SECRET";
pub const DB_PATH_ENV: &str = "COUNCIL_DB_PATH";
pub const LOG_DIR_ENV: &str = "COUNCIL_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "COUNCIL_LOG_LEVEL";

const DEFAULT_DB_FILE_NAME: &str = "ai_character_council.sqlite3";
const REJECTED_SECRETS: &[&str] = &["default-dev-secret", "REPLACE_WITH_A_SECURE_KEY"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingAppSecret,
    InsecureAppSecret,
    InvalidLogLevel(String),
    InvalidLogDir(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingAppSecret => write!(
                f,
                "{APP_SECRET_ENV} is not set; refusing to start without a vault secret"
            ),
            Self::InsecureAppSecret => write!(
                f,
                "{APP_SECRET_ENV} is set to a well-known development value; refusing to start"
            ),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::InvalidLogDir(value) => write!(
                f,
                "{LOG_DIR_ENV} must be an absolute path, got `{value}`"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Resolved host configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Secret the vault derives its encryption key from.
    pub app_secret: SecretString,
    pub db_path: PathBuf,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub log_level: LogLevel,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        // Whitespace is part of the secret; only the checks ignore it.
        let secret = lookup(APP_SECRET_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingAppSecret)?;
        if REJECTED_SECRETS.contains(&secret.trim()) {
            return Err(ConfigError::InsecureAppSecret);
        }

        let db_path = read(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));

        let log_dir = match read(LOG_DIR_ENV) {
            Some(raw) => {
                let path = PathBuf::from(&raw);
                if !path.is_absolute() {
                    return Err(ConfigError::InvalidLogDir(raw));
                }
                Some(path)
            }
            None => None,
        };

        let log_level = match read(LOG_LEVEL_ENV) {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidLogLevel)?,
            None => LogLevel::default_for_build(),
        };

        Ok(Self {
            app_secret: SecretString::from(secret),
            db_path,
            log_dir,
            log_level,
        })
    }
}
