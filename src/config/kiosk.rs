//! Top-level kiosk configuration
//!
//! Loaded once at startup from an optional JSON file. Every field has a
//! built-in default, so a partial file is merged over the defaults and a
//! missing or malformed file yields the defaults. Unknown keys are ignored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::schedule::ScheduleConfig;
use crate::constants::{defaults, keys, paths, timing};
use crate::css::layout::{sanitize_grid_columns, sanitize_zoom_level};

/// Immutable kiosk settings for one process lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KioskConfig {
    /// Page shown on the display
    pub url: String,
    pub fullscreen: bool,

    /// Legacy periodic reload, armed on every successful load
    pub auto_reload: bool,
    /// Legacy reload period (ms, 0 = disabled)
    pub reload_interval: u64,

    pub disable_shortcuts: bool,
    pub enable_debug_exit: bool,
    /// Letter for the Ctrl+Shift+<letter> debug exit
    pub debug_exit_key: String,

    pub zoom_level: f64,
    /// Grid track count (whole number >= 1)
    pub grid_columns: f64,
    /// Extra selectors to hide; untrusted until validated
    pub hide_selectors: Vec<String>,
    /// Delay between load-complete and layout injection (ms)
    pub layout_settle_delay: u64,

    pub reload_schedule: ScheduleConfig,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            url: defaults::URL.to_string(),
            fullscreen: true,
            auto_reload: true,
            reload_interval: 0,
            disable_shortcuts: true,
            enable_debug_exit: true,
            debug_exit_key: keys::DEFAULT_DEBUG_EXIT.to_string(),
            zoom_level: defaults::ZOOM_LEVEL,
            grid_columns: f64::from(defaults::GRID_COLUMNS),
            hide_selectors: Vec::new(),
            layout_settle_delay: timing::DEFAULT_LAYOUT_SETTLE_MS,
            reload_schedule: ScheduleConfig::default(),
        }
    }
}

impl KioskConfig {
    /// Default config location: `<config_dir>/camera-kiosk/config.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::CONFIG_FILENAME);
        path
    }

    /// Load from `path`, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Self::defaults_validated();
        }

        match Self::read(path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded config file");
                config
            }
            Err(e) => {
                error!(path = %path.display(), error = ?e, "Error loading config, using defaults");
                Self::defaults_validated()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Parse a JSON document merged over the defaults
    pub fn from_json(contents: &str) -> Result<Self> {
        let mut config: Self =
            serde_json::from_str(contents).context("Failed to parse config JSON")?;
        config.validate_and_clamp();
        Ok(config)
    }

    fn defaults_validated() -> Self {
        let mut config = Self::default();
        config.validate_and_clamp();
        config
    }

    /// Legacy reload timer is armed on load when this holds
    pub fn legacy_reload_enabled(&self) -> bool {
        self.auto_reload && self.reload_interval > 0
    }

    /// Validate and clamp config values to safe ranges
    fn validate_and_clamp(&mut self) {
        let columns = sanitize_grid_columns(self.grid_columns);
        if f64::from(columns) != self.grid_columns {
            warn!(
                grid_columns = self.grid_columns,
                using = columns,
                "gridColumns invalid, replacing"
            );
            self.grid_columns = f64::from(columns);
        }

        let zoom = sanitize_zoom_level(self.zoom_level);
        if zoom != self.zoom_level {
            warn!(zoom_level = self.zoom_level, using = zoom, "zoomLevel invalid, replacing");
            self.zoom_level = zoom;
        }

        let exit_key = self.debug_exit_key.trim();
        let mut letters = exit_key.chars();
        match (letters.next(), letters.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                self.debug_exit_key = c.to_ascii_lowercase().to_string();
            }
            _ => {
                warn!(
                    debug_exit_key = %self.debug_exit_key,
                    using = keys::DEFAULT_DEBUG_EXIT,
                    "debugExitKey must be a single letter, using default"
                );
                self.debug_exit_key = keys::DEFAULT_DEBUG_EXIT.to_string();
            }
        }

        self.reload_schedule.validate_and_clamp();

        // Both paths stay live; they share the idempotent reload.
        if self.legacy_reload_enabled() && self.reload_schedule.enabled {
            warn!(
                reload_interval = self.reload_interval,
                active_interval = self.reload_schedule.active_interval_ms,
                "Both autoReload/reloadInterval and reloadSchedule are enabled; reloads may overlap"
            );
        }
    }
}
