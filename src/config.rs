//! Typed configuration, loaded from a JSON file.
//!
//! The on-disk shape is `{server, db, security, invoker, store}`; configuration *loading*
//! (path resolution, env overrides, CLI flags) is an external collaborator, but the shape callers
//! deserialize into belongs here, handed to dependents as a plain typed struct rather than a DSL.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub invoker: InvokerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DbConfig {
    Sqlite {
        path: String,
    },
    Postgres {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
        #[serde(default = "default_ssl_mode")]
        ssl_mode: String,
    },
}

fn default_ssl_mode() -> String {
    "prefer".to_string()
}

impl DbConfig {
    /// Builds a `postgres://` connection string for [`sqlx::postgres::PgPoolOptions`].
    ///
    /// Returns `None` for [`DbConfig::Sqlite`] - the sqlite backend is addressed by file path,
    /// not a connection URL.
    pub fn postgres_url(&self) -> Option<String> {
        match self {
            DbConfig::Postgres {
                host,
                port,
                user,
                password,
                name,
                ssl_mode,
            } => Some(format!(
                "postgres://{user}:{password}@{host}:{port}/{name}?sslmode={ssl_mode}"
            )),
            DbConfig::Sqlite { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Appended to every password before the final hash:
    /// `H(salt ‖ H(password) ‖ global_salt) == password_hash`.
    pub global_salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Tick interval of each invoker worker, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// How long a report may stay `Running` before the startup sweeper re-queues it.
    #[serde(default = "default_running_timeout_secs")]
    pub running_timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_running_timeout_secs() -> u64 {
    600
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            running_timeout_secs: default_running_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long a replica buffers an out-of-order event before giving up and skipping the gap.
    #[serde(default = "default_gap_expiry_secs")]
    pub gap_expiry_secs: u64,
}

fn default_gap_expiry_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            gap_expiry_secs: default_gap_expiry_secs(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
