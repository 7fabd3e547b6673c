//! Configuration file handling with TOML support.

use crate::cli::{Args, parse_duration, parse_grace};
use crate::clock::DEFAULT_TIMEOUT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Countdown settings
    #[serde(default)]
    pub timer: TimerConfig,

    /// Raw mode settings
    #[serde(default)]
    pub raw: RawConfig,

    /// Alert settings
    #[serde(default)]
    pub sound: SoundConfig,
}

/// Countdown settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerConfig {
    /// Timeout used when no duration is given on the command line
    #[serde(default = "default_timeout")]
    pub default_timeout: String,

    /// Period of the tick source
    #[serde(default = "default_tick_interval")]
    pub tick_interval: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            tick_interval: default_tick_interval(),
        }
    }
}

fn default_timeout() -> String {
    humantime::format_duration(DEFAULT_TIMEOUT).to_string()
}
fn default_tick_interval() -> String {
    "1s".to_string()
}

/// Raw mode settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawConfig {
    /// File overwritten with the remaining time on every frame
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,

    /// How long the alert gets before the process exits
    #[serde(default = "default_grace_period")]
    pub grace_period: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            status_file: default_status_file(),
            grace_period: default_grace_period(),
        }
    }
}

fn default_status_file() -> PathBuf {
    std::env::temp_dir().join("cofe_status")
}
fn default_grace_period() -> String {
    "5s".to_string()
}

/// Alert settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SoundConfig {
    /// Skip the alert sound entirely
    #[serde(default)]
    pub muted: bool,
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from default location or fall back to defaults.
    pub fn load_or_default() -> Self {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return config,
                    Err(e) => warn!("Failed to load config: {e:#}"),
                }
            }
        }
        Config::default()
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cofe").join("config.toml"))
    }
}

/// Effective settings after merging CLI arguments over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub timeout: Duration,
    pub tick_interval: Duration,
    pub raw: bool,
    pub status_file: PathBuf,
    pub grace_period: Duration,
    pub muted: bool,
}

impl Settings {
    /// Merge `args` over `config`. Command-line values win.
    pub fn resolve(args: &Args, config: &Config) -> Result<Self> {
        let timeout = match args.duration {
            Some(duration) => duration,
            None => config_duration("timer.default_timeout", &config.timer.default_timeout)?,
        };
        let tick_interval = match args.interval {
            Some(interval) => interval,
            None => config_duration("timer.tick_interval", &config.timer.tick_interval)?,
        };
        let grace_period = match args.grace {
            Some(grace) => grace,
            None => grace_duration(&config.raw.grace_period)?,
        };

        Ok(Self {
            timeout,
            tick_interval,
            raw: args.raw,
            status_file: args
                .status_file
                .clone()
                .unwrap_or_else(|| config.raw.status_file.clone()),
            grace_period,
            muted: args.mute || config.sound.muted,
        })
    }
}

fn config_duration(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).with_context(|| format!("Invalid {key} in config file"))
}

/// The grace period is the one duration that may be zero.
fn grace_duration(value: &str) -> Result<Duration> {
    parse_grace(value).context("Invalid raw.grace_period in config file")
}

/// Generate a sample configuration file content.
pub fn sample_config() -> &'static str {
    r##"# Cofe Configuration File
# A terminal countdown timer with an audible alert

[timer]
# Timeout used when no duration is given on the command line
default_timeout = "4m"
# How often the countdown ticks
tick_interval = "1s"

[raw]
# File overwritten with the remaining time on every frame (--raw only)
status_file = "/tmp/cofe_status"
# How long the alert plays before cofe exits (--raw only)
grace_period = "5s"

[sound]
muted = false
"##
}
