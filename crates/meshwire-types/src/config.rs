//! configuration for the sql-backed blob store.

use serde::{Deserialize, Serialize};

/// connection settings for the external sql backend.
///
/// values load from the config file over the built-in defaults, and the
/// `SQL_*` environment variables win over the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// database host.
    pub host: String,

    /// database port.
    pub port: u16,

    /// database user.
    pub username: String,

    /// database password.
    pub password: String,

    /// database name.
    pub db: String,

    /// tls mode handed to the driver.
    pub ssl_mode: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "nopass".to_string(),
            db: "meshwire".to_string(),
            ssl_mode: "disable".to_string(),
        }
    }
}

impl SqlConfig {
    /// apply `SQL_*` environment overrides on top of the current values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("SQL_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }
        if let Ok(port) = std::env::var("SQL_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                if port != 0 {
                    self.port = port;
                }
            }
        }
        if let Ok(user) = std::env::var("SQL_USER") {
            if !user.is_empty() {
                self.username = user;
            }
        }
        if let Ok(pass) = std::env::var("SQL_PASS") {
            if !pass.is_empty() {
                self.password = pass;
            }
        }
        if let Ok(db) = std::env::var("SQL_DB") {
            if !db.is_empty() {
                self.db = db;
            }
        }
        if let Ok(mode) = std::env::var("SQL_SSL_MODE") {
            if !mode.is_empty() {
                self.ssl_mode = mode;
            }
        }
        self
    }

    /// render the dsn handed to the external postgres driver.
    pub fn dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={} connect_timeout=5",
            self.host, self.port, self.username, self.password, self.db, self.ssl_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SqlConfig::default();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.username, "postgres");
        assert_eq!(cfg.password, "nopass");
        assert_eq!(cfg.ssl_mode, "disable");
    }

    #[test]
    fn test_dsn_rendering() {
        let cfg = SqlConfig::default();
        assert_eq!(
            cfg.dsn(),
            format!(
                "host=localhost port=5432 user=postgres password=nopass dbname={} sslmode=disable connect_timeout=5",
                cfg.db
            )
        );
    }

    #[test]
    fn test_file_values_survive_without_env() {
        // file values land in the struct via serde; defaults fill the rest
        let cfg: SqlConfig = serde_json::from_str(r#"{"host": "db.internal", "port": 5433}"#).unwrap();
        assert_eq!(cfg.host, "db.internal");
        assert_eq!(cfg.port, 5433);
        assert_eq!(cfg.username, "postgres");
    }
}
