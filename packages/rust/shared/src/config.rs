//! Application configuration for Triage.
//!
//! User config lives at `~/.triage/triage.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! This file only holds process-level settings (where the database lives,
//! HTTP timeouts, size caps). The steering prompt and provider credentials
//! are pipeline configuration and live in the store, see
//! [`crate::pipeline_config`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "triage.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".triage";

// ---------------------------------------------------------------------------
// Config structs (matching triage.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Content extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Remote document download settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Model backend call settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file (`~` is expanded).
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl StorageConfig {
    /// Resolved database path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.database_path)
    }
}

fn default_database_path() -> String {
    "~/.triage/triage.db".into()
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Timeout for page fetches in seconds.
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with page fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// A content region must yield more than this many characters to be chosen.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Watch-page URL used for video metadata lookups (the id is appended as `?v=`).
    #[serde(default = "default_video_watch_url")]
    pub video_watch_url: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extraction_timeout(),
            user_agent: default_user_agent(),
            min_content_chars: default_min_content_chars(),
            video_watch_url: default_video_watch_url(),
        }
    }
}

fn default_extraction_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
}
fn default_min_content_chars() -> usize {
    100
}
fn default_video_watch_url() -> String {
    "https://www.youtube.com/watch".into()
}

/// `[delivery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Timeout for document downloads in seconds.
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,

    /// Maximum accepted document size in bytes.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_delivery_timeout(),
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

fn default_delivery_timeout() -> u64 {
    30
}
fn default_max_download_bytes() -> u64 {
    50 * 1024 * 1024
}

/// `[gateway]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Timeout for a single model call in seconds.
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// Output token cap requested from the model.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature for providers that accept one.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_gateway_timeout(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_gateway_timeout() -> u64 {
    60
}
fn default_max_output_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.1
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.triage/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| TriageError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.triage/triage.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TriageError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TriageError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TriageError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TriageError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("max_download_bytes"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.extraction.timeout_secs, 10);
        assert_eq!(parsed.extraction.min_content_chars, 100);
        assert_eq!(parsed.gateway.max_output_tokens, 500);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[storage]
database_path = "/tmp/triage-test.db"

[gateway]
timeout_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.storage.database_path, "/tmp/triage-test.db");
        assert_eq!(config.gateway.timeout_secs, 5);
        assert_eq!(config.gateway.max_output_tokens, 500);
        assert_eq!(config.delivery.timeout_secs, 30);
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/triage.toml")).unwrap_err();
        assert!(matches!(err, TriageError::Io { .. }));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/db/x.db"), PathBuf::from("/var/db/x.db"));
        let expanded = expand_home("~/x.db");
        assert!(expanded.ends_with("x.db"));
    }
}
