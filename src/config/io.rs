//! Configuration I/O - Loading and saving configuration
//!
//! Handles locating, reading and writing the configuration file, and
//! overlaying environment variables.

use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::types::Config;
use crate::error::{Error, Result};

/// Gateway URL override
pub const ENV_GATEWAY_URL: &str = "MISSION_CONTROL_GATEWAY_URL";
/// Gateway token override
pub const ENV_GATEWAY_TOKEN: &str = "MISSION_CONTROL_GATEWAY_TOKEN";
/// Connect deadline override (humantime, e.g. `15s`)
pub const ENV_CONNECT_TIMEOUT: &str = "MISSION_CONTROL_CONNECT_TIMEOUT";
/// Request deadline override (humantime, e.g. `12s`)
pub const ENV_REQUEST_TIMEOUT: &str = "MISSION_CONTROL_REQUEST_TIMEOUT";

/// Config directory override
pub const ENV_CONFIG_DIR: &str = "MISSION_CONTROL_CONFIG_DIR";
/// Config file override
pub const ENV_CONFIG_FILE: &str = "MISSION_CONTROL_CONFIG";

const APP_DIR: &str = "mission-control";
const CONFIG_FILES: [&str; 2] = ["config.json", "config.toml"];

/// Directory holding the config file
pub fn config_dir() -> PathBuf {
    config_dir_from(|key| std::env::var(key).ok())
}

fn config_dir_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(ENV_CONFIG_DIR)
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|d| d.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

/// Config file to load, and where `init-config` writes
///
/// An explicit file override wins. Otherwise the first existing
/// `config.json` or `config.toml` in [`config_dir`], else `config.json`.
pub fn config_path() -> PathBuf {
    resolve_config_path(|key| std::env::var(key).ok())
}

fn resolve_config_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = lookup(ENV_CONFIG_FILE) {
        return PathBuf::from(path);
    }

    let dir = config_dir_from(&lookup);
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
        .unwrap_or_else(|| dir.join(CONFIG_FILES[0]))
}

/// Load configuration with layered precedence:
/// 1. Config file if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        debug!("No config file at {}, using defaults", config_path.display());
        Config::default()
    };

    // Apply environment variable overrides (highest precedence)
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first, then overlays any set variables. Env vars have the
/// highest precedence: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from any key lookup
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_GATEWAY_URL) {
        config.gateway.url = url;
    }
    if let Some(token) = lookup(ENV_GATEWAY_TOKEN) {
        config.gateway.token = SecretString::from(token);
    }
    if let Some(timeout) = lookup(ENV_CONNECT_TIMEOUT) {
        match humantime::parse_duration(&timeout) {
            Ok(v) => config.gateway.connect_timeout = v,
            Err(e) => warn!("Ignoring {}={}: {}", ENV_CONNECT_TIMEOUT, timeout, e),
        }
    }
    if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
        match humantime::parse_duration(&timeout) {
            Ok(v) => config.gateway.request_timeout = v,
            Err(e) => warn!("Ignoring {}={}: {}", ENV_REQUEST_TIMEOUT, timeout, e),
        }
    }
}

/// Save configuration to a file
///
/// The gateway token is never written.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "toml") {
        toml::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.gateway.url = "wss://gw.example.com".to_string();
        config.gateway.token = SecretString::from("secret-token".to_string());
        config.gateway.request_timeout = Duration::from_secs(30);
        save_config(&config, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("secret-token"));

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.gateway.url, config.gateway.url);
        assert_eq!(loaded.gateway.request_timeout, Duration::from_secs(30));
        assert_eq!(loaded.gateway.connect_timeout, Duration::from_secs(15));
        assert!(loaded.gateway.token().is_none());
        assert_eq!(loaded.client.id, "openclaw-android");
    }

    #[test]
    fn test_load_toml_with_token() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[gateway]\nurl = \"gw.local:18789\"\ntoken = \"abc\"\nconnect_timeout = \"5s\"\n\n[client]\nplatform = \"linux\"\n",
        )
        .unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.gateway.url, "gw.local:18789");
        assert_eq!(loaded.gateway.token().unwrap().expose_secret(), "abc");
        assert_eq!(loaded.gateway.connect_timeout, Duration::from_secs(5));
        assert_eq!(loaded.client.platform, "linux");
        assert_eq!(loaded.client.mode, "webchat");
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ gateway: ").unwrap();
        assert!(matches!(load_config_from_path(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_path_resolution() {
        let dir = tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        let only_dir = |k: &str| (k == ENV_CONFIG_DIR).then(|| dir_str.clone());

        assert_eq!(config_dir_from(only_dir), dir.path());
        assert_eq!(resolve_config_path(only_dir), dir.path().join("config.json"));

        // A TOML file is picked up when no JSON file exists
        std::fs::write(dir.path().join("config.toml"), "").unwrap();
        assert_eq!(resolve_config_path(only_dir), dir.path().join("config.toml"));

        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        assert_eq!(resolve_config_path(only_dir), dir.path().join("config.json"));

        let explicit = |k: &str| match k {
            ENV_CONFIG_FILE => Some("/etc/mc.toml".to_string()),
            _ => only_dir(k),
        };
        assert_eq!(resolve_config_path(explicit), PathBuf::from("/etc/mc.toml"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_GATEWAY_URL, "https://gw.example.com"),
            (ENV_GATEWAY_TOKEN, "from-env"),
            (ENV_CONNECT_TIMEOUT, "2s"),
            (ENV_REQUEST_TIMEOUT, "not a duration"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides_from(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.gateway.url, "https://gw.example.com");
        assert_eq!(config.gateway.token().unwrap().expose_secret(), "from-env");
        assert_eq!(config.gateway.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.gateway.request_timeout, Duration::from_secs(12));
    }
}
