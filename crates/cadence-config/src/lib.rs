//! Cadence configuration system
//!
//! This crate provides centralized configuration management for cadence,
//! loading settings from `cadence.toml` as an alternative to environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for cadence
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CadenceConfig {
    /// Playback timing defaults
    pub playback: PlaybackConfig,
    /// Tick driver settings
    pub driver: DriverConfig,
    /// Diagnostic settings
    pub debug: DebugConfig,
}

/// Playback timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Default section duration in milliseconds when a section declares none
    pub default_duration_ms: f64,
    /// Default start delay in milliseconds
    pub default_delay_ms: f64,
    /// Named easing applied when a section declares none
    /// (linear, ease, ease-in, ease-out, ease-in-out)
    pub default_easing: Option<String>,
}

/// Tick driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Nominal tick interval in milliseconds, for embedders that poll
    pub tick_ms: Option<f64>,
}

/// Diagnostic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log every rule preparation and task binding
    pub trace_rules: bool,
    /// Log sequencer state transitions
    pub trace_sequencer: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 300.0,
            default_delay_ms: 0.0,
            default_easing: None,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { tick_ms: None }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            trace_rules: false,
            trace_sequencer: false,
        }
    }
}

impl CadenceConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the cadence.toml configuration file
    ///
    /// # Returns
    /// * `Ok(CadenceConfig)` - Successfully loaded configuration
    /// * `Err(String)` - Error message if loading failed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load configuration from the default location (cadence.toml in the
    /// current directory) or return default configuration if file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file("cadence.toml").unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    /// This allows for temporary overrides without modifying the config file.
    pub fn merge_with_env(&mut self) {
        if let Ok(val) = std::env::var("CADENCE_DEFAULT_DURATION_MS") {
            if let Ok(ms) = val.parse::<f64>() {
                self.playback.default_duration_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("CADENCE_DEFAULT_DELAY_MS") {
            if let Ok(ms) = val.parse::<f64>() {
                self.playback.default_delay_ms = ms;
            }
        }
        if let Ok(easing) = std::env::var("CADENCE_DEFAULT_EASING") {
            self.playback.default_easing = Some(easing);
        }
        if let Ok(val) = std::env::var("CADENCE_TICK_MS") {
            if let Ok(ms) = val.parse::<f64>() {
                self.driver.tick_ms = Some(ms);
            }
        }
        if let Ok(val) = std::env::var("CADENCE_TRACE_RULES") {
            self.debug.trace_rules = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = std::env::var("CADENCE_TRACE_SEQUENCER") {
            self.debug.trace_sequencer = val == "1" || val.eq_ignore_ascii_case("true");
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// This is the recommended way to load configuration:
    /// 1. Load from cadence.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}
