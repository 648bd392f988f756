//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files, with a few
//! settings overridable from the environment for container deployments.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Cookie Relay Configuration
# Auto-generated - edit as needed

[server]
bind_address = "0.0.0.0:3000"

# Origins allowed by CORS; a trailing * matches any suffix
allowed_origins = ["chrome-extension://*"]

# "production" hides internal error details, "development" shows them
environment = "production"

# Maximum request body size in bytes (default: 10 MiB)
body_limit_bytes = 10485760

request_timeout_secs = 30

[storage]
# "sqlite" (default) or "memory"
backend = "sqlite"

[sync]
# Per-domain save deadline in milliseconds (0 = none)
domain_timeout_ms = 0

# Interval of the background domain index sweep in seconds (0 = disabled)
index_sweep_interval_secs = 0

[identity]
base_url = "https://identitytoolkit.googleapis.com/v1"

# Web API key of the identity project (or set FIREBASE_API_KEY)
api_key = ""

request_timeout_secs = 10

[paths]
# Custom data directory (optional, defaults to ~/.cookie-relay)
# data_dir = "/custom/path"
"#;

/// Load configuration and apply environment overrides.
///
/// An explicit `path` must exist. Without one, the default location is
/// used if present, otherwise built-in defaults.
///
/// # Errors
/// Returns error if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from_file(path)?,
        None => {
            let default_path = config_file_path();
            if default_path.exists() {
                load_config_from_file(&default_path)?
            } else {
                AppConfig::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Overlay environment settings onto `config`.
///
/// `PORT` replaces only the port of the bind address.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = get("PORT") {
        let host = config
            .server
            .bind_address
            .rsplit_once(':')
            .map_or("0.0.0.0", |(host, _)| host);
        config.server.bind_address = format!("{host}:{}", port.trim());
    }

    if let Some(origins) = get("ALLOWED_ORIGINS") {
        config.server.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(env) = get("COOKIE_RELAY_ENV") {
        config.server.environment = env;
    }

    if let Some(key) = get("FIREBASE_API_KEY") {
        config.identity.api_key = key;
    }

    if let Some(url) = get("IDENTITY_BASE_URL") {
        config.identity.base_url = url;
    }
}

/// Write the commented default configuration if no file exists at `path`.
///
/// Returns whether a file was created.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %path.display(), "Created default configuration");

    Ok(true)
}

/// Get the path to the default configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_data_dir().join("config.toml")
}
