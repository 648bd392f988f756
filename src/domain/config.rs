//! Application configuration model.
//!
//! Every section and field has a default so a missing or partial
//! config file still yields a working server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// CORS origins. A trailing `*` matches any suffix.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// `production` hides internal error details from responses.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Maximum accepted request body size.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Whole-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            allowed_origins: default_allowed_origins(),
            environment: default_environment(),
            body_limit_bytes: default_body_limit(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Whether responses may include internal error details.
    #[must_use]
    pub fn expose_error_details(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["chrome-extension://*".to_string()]
}

fn default_environment() -> String {
    "production".to_string()
}

const fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

const fn default_request_timeout() -> u64 {
    30
}

/// Which record store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database under the data directory.
    #[default]
    Sqlite,
    /// Process-local maps; contents are lost on shutdown.
    Memory,
}

/// Configuration for record storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Configuration for the sync reconciler and index maintenance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Per-domain upsert deadline in milliseconds (0 = none).
    #[serde(default)]
    pub domain_timeout_ms: u64,

    /// Interval of the background index sweep in seconds (0 = disabled).
    #[serde(default)]
    pub index_sweep_interval_secs: u64,
}

/// Identity provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the Identity Toolkit REST API.
    #[serde(default = "default_identity_base_url")]
    pub base_url: String,

    /// Web API key of the project.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_identity_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: default_identity_base_url(),
            api_key: String::new(),
            request_timeout_secs: default_identity_timeout(),
        }
    }
}

fn default_identity_base_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

const fn default_identity_timeout() -> u64 {
    10
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cookie-relay")
    }

    /// Get the storage database path.
    #[must_use]
    pub fn storage_db_path(&self) -> PathBuf {
        self.data_dir().join("cookies.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.body_limit_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.sync.domain_timeout_ms, 0);
        assert!(!config.server.expose_error_details());
    }

    #[test]
    fn test_development_exposes_details() {
        let server = ServerConfig {
            environment: "Development".into(),
            ..ServerConfig::default()
        };
        assert!(server.expose_error_details());
    }

    #[test]
    fn test_storage_paths() {
        let config = AppConfig {
            paths: PathConfig {
                data_dir: Some(PathBuf::from("/srv/relay")),
            },
            ..AppConfig::default()
        };
        assert_eq!(config.storage_db_path(), PathBuf::from("/srv/relay/cookies.db"));
        assert_eq!(config.config_file_path(), PathBuf::from("/srv/relay/config.toml"));
    }
}
