//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$RECEIPTBOX_CONFIG` (environment variable)
//! 2. `~/.config/receiptbox/config.toml` (Linux/macOS)
//!    `%APPDATA%\receiptbox\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReceiptError, Result};

/// Environment variable that overrides `[preview] token`.
pub const PREVIEW_TOKEN_ENV: &str = "RECEIPTBOX_PREVIEW_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Business code whitelist.
    pub codes: CodesConfig,
    /// Remote thumbnail service.
    pub preview: PreviewConfig,
    /// HTML to document conversion.
    pub render: RenderConfig,
    /// Output defaults.
    pub output: OutputConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Valid business codes and the fallback code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodesConfig {
    /// Codes accepted on a tag line.
    pub whitelist: Vec<String>,
    /// Code used whenever no tag line is found.
    pub default_code: String,
}

/// Remote thumbnail service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Request thumbnails for PDF attachments.
    pub enabled: bool,
    /// Base URL of the files API.
    pub endpoint: String,
    /// Bearer token. `$RECEIPTBOX_PREVIEW_TOKEN` takes precedence.
    pub token: Option<String>,
    /// Requested thumbnail edge length in pixels.
    pub thumbnail_size: u32,
    /// Wait before each readiness check, in seconds. Must be non-decreasing.
    pub backoff_secs: Vec<u64>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

/// HTML to document conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// External converter argv, reading HTML on stdin and writing the
    /// document on stdout. Empty: write the HTML itself.
    pub command: Vec<String>,
}

/// Output defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output directory.
    pub directory: Option<PathBuf>,
    /// Also write deduplicated non-image attachments as standalone files.
    pub save_attachments: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for CodesConfig {
    fn default() -> Self {
        Self {
            whitelist: ["AIRBNB", "TF", "TMM", "DCL", "HSA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_code: "DCL".to_string(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://www.googleapis.com/drive/v3".to_string(),
            token: None,
            thumbnail_size: 1000,
            backoff_secs: vec![2, 3, 4, 5, 5],
            timeout_secs: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            save_attachments: true,
        }
    }
}

impl PreviewConfig {
    /// The backoff schedule as durations.
    pub fn backoff(&self) -> Vec<Duration> {
        self.backoff_secs
            .iter()
            .map(|&s| Duration::from_secs(s))
            .collect()
    }

    /// Token from the environment, falling back to the file.
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var(PREVIEW_TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.token.clone())
    }
}

impl Config {
    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.codes.default_code.trim().is_empty() {
            return Err(ReceiptError::Config(
                "codes.default_code must not be empty".into(),
            ));
        }
        if self.preview.backoff_secs.windows(2).any(|w| w[1] < w[0]) {
            return Err(ReceiptError::Config(format!(
                "preview.backoff_secs must be non-decreasing, got {:?}",
                self.preview.backoff_secs
            )));
        }
        if self.preview.enabled && self.preview.endpoint.trim().is_empty() {
            return Err(ReceiptError::Config(
                "preview.endpoint is required when previews are enabled".into(),
            ));
        }
        Ok(())
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("RECEIPTBOX_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("receiptbox").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("receiptbox")
}
