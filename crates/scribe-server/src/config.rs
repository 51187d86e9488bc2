//! Server configuration from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Secrets shipped in sample `.env` files. Refused at startup.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub index_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SCRIBE_JWT_SECRET`: token signing secret, must not be a placeholder
    ///
    /// Optional:
    /// - `SCRIBE_DB_PATH` (default: `data/notes.sqlite3`)
    /// - `SCRIBE_INDEX_PATH` (default: `data/notes.index`)
    /// - `SCRIBE_HOST` (default: `0.0.0.0`)
    /// - `SCRIBE_PORT` (default: 3000)
    /// - `SCRIBE_TOKEN_TTL_HOURS` (default: 72)
    /// - `SCRIBE_REQUEST_TIMEOUT_MS` (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("SCRIBE_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("SCRIBE_JWT_SECRET".to_string()))?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::InvalidValue {
                name: "SCRIBE_JWT_SECRET".to_string(),
                reason: "still a placeholder".to_string(),
            });
        }

        let db_path = lookup("SCRIBE_DB_PATH").unwrap_or_else(|| "data/notes.sqlite3".into());
        let index_path = lookup("SCRIBE_INDEX_PATH").unwrap_or_else(|| "data/notes.index".into());
        let host = lookup("SCRIBE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "SCRIBE_PORT", 3000u16)?;
        let ttl_hours = parse_or(&lookup, "SCRIBE_TOKEN_TTL_HOURS", 72i64)?;
        let timeout_ms = parse_or(&lookup, "SCRIBE_REQUEST_TIMEOUT_MS", 5000u64)?;

        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "SCRIBE_TOKEN_TTL_HOURS".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            db_path: db_path.into(),
            index_path: index_path.into(),
            host,
            port,
            jwt_secret,
            token_ttl: chrono::Duration::hours(ttl_hours),
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                name: "SCRIBE_HOST".to_string(),
                reason: e.to_string(),
            })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}
