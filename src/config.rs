//! Configuration loading and defaults for idle-reloadd.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for idle-reloadd.
///
/// The five-minute inactivity window is a source-time constant
/// (`watchdog::IDLE_TIMEOUT`) and deliberately not part of this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Activity socket path.
    /// If unset, defaults to `$XDG_RUNTIME_DIR/idle-reloadd/activity.sock`.
    pub socket_path: Option<PathBuf>,

    /// Command executed to reload the displayed page (default: xdotool key F5).
    pub reload_command: Vec<String>,

    /// Arm the watchdog at startup instead of waiting for the first page-load
    /// signal. For emitters that do not report loads (default: false).
    pub arm_on_start: bool,

    /// Dry run mode: log the reload command instead of executing.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            reload_command: vec![
                "xdotool".to_string(),
                "key".to_string(),
                "F5".to_string(),
            ],
            arm_on_start: false,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        // Try default config path
        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("idle-reloadd").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }
}
