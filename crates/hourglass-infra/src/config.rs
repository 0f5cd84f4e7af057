//! Configuration loader for Hourglass.
//!
//! Reads `config.toml` from the data directory (`~/.hourglass/` in
//! production) and deserializes it into [`HourglassConfig`]. Falls back to
//! defaults when the file is missing or malformed. Credentials never live in
//! the file: each section names the environment variable holding its secret.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use hourglass_types::config::HourglassConfig;

/// Data directory from `HOURGLASS_DATA_DIR`, falling back to `~/.hourglass`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HOURGLASS_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hourglass")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`HourglassConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> HourglassConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return HourglassConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return HourglassConfig::default();
        }
    };

    match toml::from_str::<HourglassConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            HourglassConfig::default()
        }
    }
}

/// Read a secret from the environment variable `name`.
///
/// Unset or blank variables yield `None`.
pub fn secret_from_env(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}
