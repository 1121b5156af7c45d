//! Configuration for the ledger server

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// TCP listen address
    pub listen_addr: String,

    /// Snapshot file path
    pub data_file: PathBuf,

    /// Bootstrap configuration
    pub bootstrap: BootstrapConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6201".to_string(),
            data_file: PathBuf::from("./data/meridian.json"),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// Bootstrap admin account, created on first start if absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Admin username
    pub admin_username: String,

    /// Admin password
    pub admin_password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "Spookytus".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(addr) = std::env::var("MERIDIAN_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(data_file) = std::env::var("MERIDIAN_DATA_FILE") {
            config.data_file = PathBuf::from(data_file);
        }

        if let Ok(user) = std::env::var("MERIDIAN_ADMIN_USER") {
            config.bootstrap.admin_username = user;
        }

        if let Ok(password) = std::env::var("MERIDIAN_ADMIN_PASSWORD") {
            config.bootstrap.admin_password = password;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "0.0.0.0:6201");
        assert_eq!(config.bootstrap.admin_username, "admin");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meridian.toml");
        std::fs::write(
            &path,
            r#"
listen_addr = "127.0.0.1:7001"
data_file = "/tmp/ledger.json"

[bootstrap]
admin_username = "root"
admin_password = "hunter2"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:7001");
        assert_eq!(config.bootstrap.admin_username, "root");
    }
}
