//! Persistent configuration for vigil.
//!
//! Stores user defaults in `~/.vigil/config.json`: polling budget, capture
//! policy and where artifacts are written. Every field is optional in the
//! file; missing fields take the built-in defaults.
//!
//! # Example
//!
//! ```no_run
//! use vigil_core::config::VigilConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = VigilConfig::load();
//! println!("timeout: {}ms", config.timeout_ms);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::poll::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};

const CONFIG_FILENAME: &str = "config.json";
const ARTIFACTS_DIRNAME: &str = "artifacts";

/// Returns the vigil state directory (`~/.vigil`).
///
/// Creates the directory if it doesn't exist. Falls back to the system
/// temp directory when no home directory is available.
pub fn vigil_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".vigil");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

/// Persistent vigil configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Total polling budget for element assertions.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between poll attempts.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_true")]
    pub capture_on_failure: bool,

    #[serde(default)]
    pub capture_on_success: bool,

    /// Root directory for screenshots. Defaults to `~/.vigil/artifacts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_root: Option<PathBuf>,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            capture_on_failure: true,
            capture_on_success: false,
            artifact_root: None,
        }
    }
}

impl VigilConfig {
    /// Load config from `~/.vigil/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&vigil_dir().join(CONFIG_FILENAME))
    }

    /// Load config from an explicit path, with the same fallback as [`load`](Self::load).
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.vigil/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&vigil_dir().join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }

    /// The configured artifact root, or `~/.vigil/artifacts`.
    pub fn artifact_root(&self) -> PathBuf {
        self.artifact_root
            .clone()
            .unwrap_or_else(|| vigil_dir().join(ARTIFACTS_DIRNAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = VigilConfig::default();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.poll_interval_ms, 500);
        assert!(config.capture_on_failure);
        assert!(!config.capture_on_success);
        assert!(config.artifact_root.is_none());
    }

    #[test]
    fn deserialize_empty_json_uses_defaults() {
        let loaded: VigilConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(loaded, VigilConfig::default());
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let loaded: VigilConfig =
            serde_json::from_str(r#"{"timeout_ms": 1200, "capture_on_failure": false}"#).unwrap();
        assert_eq!(loaded.timeout_ms, 1200);
        assert_eq!(loaded.poll_interval_ms, 500);
        assert!(!loaded.capture_on_failure);
    }

    #[test]
    fn load_from_missing_file_returns_default() {
        let path = std::env::temp_dir().join(format!("vigil-missing-{}.json", uuid::Uuid::new_v4()));
        assert_eq!(VigilConfig::load_from(&path), VigilConfig::default());
    }

    #[test]
    fn save_and_reload() {
        let path = std::env::temp_dir().join(format!("vigil-config-{}.json", uuid::Uuid::new_v4()));
        let config = VigilConfig {
            timeout_ms: 900,
            artifact_root: Some(PathBuf::from("/tmp/vigil-artifacts")),
            ..VigilConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(VigilConfig::load_from(&path), config);
        std::fs::remove_file(&path).ok();
    }
}
