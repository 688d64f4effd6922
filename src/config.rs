//! Configuration
//!
//! Bootstrap configuration is a small TOML file: where the catalog and the
//! settings database live, which port the control surface binds, and the
//! playback timing constants. Every field except the catalog path has a
//! built-in default; the file only needs to state what differs.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the track catalog TOML file
    pub catalog_path: PathBuf,

    /// Path to the SQLite settings database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP control surface port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback timing constants
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Crossfade length in seconds
    #[serde(default = "default_crossfade_seconds")]
    pub crossfade_seconds: f64,

    /// Safety margin between gain ramps settling and the slot swap firing
    #[serde(default = "default_swap_margin_ms")]
    pub swap_margin_ms: u64,

    /// Engine poll interval for position and end-of-track detection
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Previous-track presses inside this window move back a track;
    /// beyond it they restart the current one
    #[serde(default = "default_restart_window_seconds")]
    pub restart_window_seconds: f64,
}

impl PlaybackConfig {
    pub fn crossfade(&self) -> Duration {
        Duration::from_secs_f64(self.crossfade_seconds.max(0.0))
    }

    pub fn swap_margin(&self) -> Duration {
        Duration::from_millis(self.swap_margin_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            crossfade_seconds: default_crossfade_seconds(),
            swap_margin_ms: default_swap_margin_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            restart_window_seconds: default_restart_window_seconds(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("segue.db")
}

fn default_port() -> u16 {
    5750
}

fn default_crossfade_seconds() -> f64 {
    1.0
}

fn default_swap_margin_ms() -> u64 {
    50
}

fn default_tick_interval_ms() -> u64 {
    200
}

fn default_restart_window_seconds() -> f64 {
    3.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read '{}': {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse '{}': {}", path.display(), e)))
    }
}

// ========================================
// Tests
// ========================================
