use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::inference::Quantization;

/// Application-level constants
pub const APP_NAME: &str = "ER Clinical Intelligence Suite";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_DATABASE_URL: &str = "clinical_suite.db";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL_NAME: &str = "medgemma:7b-q4_k_m";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,clinical_suite_lib=debug,tower_http=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("Unsupported database URL scheme: {0} (expected a SQLite path)")]
    UnsupportedDatabase(String),
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Raw `ENCRYPTION_KEY` (base64 key or passphrase). `None` = ephemeral key.
    pub encryption_key: Option<String>,
    pub ollama_host: String,
    pub model_name: String,
    pub quantization: Quantization,
    pub redis_url: Option<String>,
    pub hf_token: Option<String>,
    pub bind_addr: SocketAddr,
    pub retention_days: i64,
}

impl AppConfig {
    /// Load from the process environment. A `.env` file in the working
    /// directory is applied first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (tests inject a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let retention_days = match get("RETENTION_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or(ConfigError::InvalidValue {
                    var: "RETENTION_DAYS",
                    reason: format!("expected a positive integer, got '{raw}'"),
                })?,
            None => DEFAULT_RETENTION_DAYS,
        };

        let quantization = match get("MODEL_QUANTIZATION") {
            Some(raw) => raw
                .parse::<Quantization>()
                .map_err(|reason| ConfigError::InvalidValue {
                    var: "MODEL_QUANTIZATION",
                    reason,
                })?,
            None => Quantization::default(),
        };

        let config = Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            encryption_key: get("ENCRYPTION_KEY"),
            ollama_host: get("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            model_name: get("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            quantization,
            redis_url: get("REDIS_URL"),
            hf_token: get("HF_TOKEN"),
            bind_addr,
            retention_days,
        };

        // Fail fast on a database URL we cannot open.
        config.database_location()?;
        Ok(config)
    }

    /// Resolve `DATABASE_URL` to a SQLite location.
    pub fn database_location(&self) -> Result<DatabaseLocation, ConfigError> {
        let url = self.database_url.trim();
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        if path == ":memory:" {
            return Ok(DatabaseLocation::Memory);
        }
        if path.contains("://") {
            return Err(ConfigError::UnsupportedDatabase(scheme_of(path).to_string()));
        }
        Ok(DatabaseLocation::File(PathBuf::from(path)))
    }
}

fn scheme_of(url: &str) -> &str {
    url.split("://").next().unwrap_or(url)
}
