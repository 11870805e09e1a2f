//! Process settings from the environment (optionally seeded from `.env`).

use crate::error::ConfigError;
use std::net::SocketAddr;

pub const DEFAULT_DB_SCHEMA: &str = "forest";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// PostgreSQL URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// PostgreSQL schema holding the inventory tables.
    pub db_schema: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub body_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            db_schema: DEFAULT_DB_SCHEMA.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_schema = get("FOREST_DB_SCHEMA").unwrap_or_else(|| DEFAULT_DB_SCHEMA.into());
        if !is_identifier(&db_schema) {
            return Err(ConfigError::InvalidSetting {
                name: "FOREST_DB_SCHEMA",
                reason: format!("'{}' is not a valid identifier", db_schema),
            });
        }

        let max_connections = match get("FOREST_DB_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| ConfigError::InvalidSetting {
                name: "FOREST_DB_MAX_CONNECTIONS",
                reason: format!("expected a positive integer, got '{}'", v),
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let bind = get("FOREST_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind.parse::<SocketAddr>().map_err(|e| ConfigError::InvalidSetting {
            name: "FOREST_BIND_ADDR",
            reason: format!("'{}': {}", bind, e),
        })?;

        let body_limit_bytes = match get("FOREST_BODY_LIMIT_BYTES") {
            Some(v) => v.parse::<usize>().map_err(|_| ConfigError::InvalidSetting {
                name: "FOREST_BODY_LIMIT_BYTES",
                reason: format!("expected a byte count, got '{}'", v),
            })?,
            None => DEFAULT_BODY_LIMIT_BYTES,
        };

        Ok(Settings {
            database_url: get("DATABASE_URL"),
            db_schema,
            max_connections,
            bind_addr,
            body_limit_bytes,
        })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
