//! Connection configuration for the driver.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`TRUENO_STORAGE__` prefix, e.g. `TRUENO_STORAGE__PORT=9000`)
//! 2. Config file (`<prefix>.toml`, `[storage]` section)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Where and how the driver connects to the remote service.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DriverConfig {
    /// Server address including scheme (default: "http://localhost").
    #[serde(default = "default_server")]
    pub server: String,

    /// Server port (default: 8000).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graph (database) the application works with by default.
    #[serde(default)]
    pub database: String,

    /// Fail a call if no acknowledgment arrives within this many
    /// milliseconds. Unset means wait indefinitely.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl DriverConfig {
    /// Load configuration from `<file_prefix>.toml` and the environment.
    ///
    /// A missing file or missing `[storage]` section yields the defaults;
    /// a present but invalid value is an error.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TRUENO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<DriverConfig>("storage") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => {
                tracing::debug!(file_prefix, "No storage configuration found, using defaults");
                Ok(DriverConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The address handed to the transport's `connect`.
    pub fn url(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

fn default_server() -> String {
    "http://localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_port(),
            database: String::new(),
            call_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.server, "http://localhost");
        assert_eq!(config.port, 8000);
        assert_eq!(config.url(), "http://localhost:8000");
        assert!(config.call_timeout().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("trueno.toml"),
            "[storage]\nserver = \"http://db.internal\"\nport = 8100\ndatabase = \"citations\"\ncall_timeout_ms = 2500\n",
        )
        .unwrap();

        let prefix = dir.path().join("trueno");
        let config = DriverConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.url(), "http://db.internal:8100");
        assert_eq!(config.database, "citations");
        assert_eq!(config.call_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_partial_section_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("partial.toml"),
            "[storage]\ndatabase = \"graphi\"\n",
        )
        .unwrap();

        let prefix = dir.path().join("partial");
        let config = DriverConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.server, "http://localhost");
        assert_eq!(config.port, 8000);
        assert_eq!(config.database, "graphi");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = DriverConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config, DriverConfig::default());
    }
}
