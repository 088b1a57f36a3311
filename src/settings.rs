//! Application settings management
//!
//! Tunables for scanning and restarting, stored as TOML in the user's
//! config directory. Every field is optional; a missing file means defaults.

use crate::lifecycle::DEFAULT_SETTLE;
use crate::names::DEFAULT_ANCESTOR_DEPTH;
use crate::scan::{DEFAULT_REMOTE_MARKERS, ScanOptions};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Pause between disabling and re-enabling a device, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Ancestor levels searched for a product name
    #[serde(default = "default_ancestor_depth")]
    pub ancestor_depth: usize,

    /// Name fragments marking remote-session devices
    #[serde(default = "default_remote_markers")]
    pub remote_markers: Vec<String>,

    /// Restart the device right after changing its flag
    #[serde(default = "default_auto_restart")]
    pub auto_restart: bool,
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE.as_millis() as u64
}

fn default_ancestor_depth() -> usize {
    DEFAULT_ANCESTOR_DEPTH
}

fn default_remote_markers() -> Vec<String> {
    DEFAULT_REMOTE_MARKERS.iter().map(|m| m.to_string()).collect()
}

fn default_auto_restart() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            ancestor_depth: default_ancestor_depth(),
            remote_markers: default_remote_markers(),
            auto_restart: default_auto_restart(),
        }
    }
}

impl AppSettings {
    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("wheelflip");
        Ok(config_dir.join("settings.toml"))
    }

    /// Load settings from the default location (or use defaults)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings file: {:?}", path))?;
            let settings: AppSettings = toml::from_str(&content)
                .with_context(|| format!("Failed to parse settings file: {:?}", path))?;
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            info!("No settings file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        fs::write(path, self.to_toml()?).context("Failed to write settings file")?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }

    /// Update one field from its command line form.
    ///
    /// `remote_markers` takes a comma-separated list; an empty value clears it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "settle_ms" => {
                self.settle_ms = value
                    .parse()
                    .with_context(|| format!("Invalid settle_ms: {}", value))?
            }
            "ancestor_depth" => {
                self.ancestor_depth = value
                    .parse()
                    .with_context(|| format!("Invalid ancestor_depth: {}", value))?
            }
            "auto_restart" => {
                self.auto_restart = value
                    .parse()
                    .with_context(|| format!("Invalid auto_restart: {}", value))?
            }
            "remote_markers" => {
                self.remote_markers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect()
            }
            other => bail!("Unknown setting: {}", other),
        }
        Ok(())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            ancestor_depth: self.ancestor_depth,
            remote_markers: self.remote_markers.clone(),
        }
    }
}
