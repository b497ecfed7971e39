use crate::error::{MailError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Mail domain served locally, e.g. `glo2000.ca`
    pub domain: String,
    pub listen_addr: String,
    /// Largest accepted frame, in bytes
    pub max_frame_length: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Name of the shared directory receiving mail for unknown local users
    pub lost_dir: String,
    /// Name of the credential file inside each mailbox
    pub password_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub min_password_length: usize,
    pub require_uppercase: bool,
    pub require_digit: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| MailError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| MailError::Config(e.to_string()))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            domain: "glo2000.ca".to_string(),
            listen_addr: "127.0.0.1:14000".to_string(),
            max_frame_length: 1024 * 1024, // 1MB
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "server_data".to_string(),
            lost_dir: "LOST".to_string(),
            password_file: "passwd".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: 10,
            require_uppercase: true,
            require_digit: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
