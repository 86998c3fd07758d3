//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{LinkError, Result};
use crate::ota::packer::SwitchMode;
use crate::power::dynamic::{AirRate, DynamicPowerConfig};
use crate::power::PowerLevel;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Air interface configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default)]
    pub air_rate: AirRate,

    /// Uplink packets per downlink telemetry packet
    #[serde(default = "default_telemetry_ratio")]
    pub telemetry_ratio: u16,

    #[serde(default)]
    pub switch_mode: SwitchMode,
}

/// Transmit power configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PowerConfig {
    #[serde(default = "default_target_mw")]
    pub target_mw: u16,

    #[serde(default = "default_min_mw")]
    pub min_mw: u16,

    #[serde(default = "default_dynamic_power")]
    pub dynamic_power: bool,

    /// 0 = off, 1..=4 selects AUX9..AUX12
    #[serde(default)]
    pub boost_channel: u8,
}

/// Host simulation scenario
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_duration_s")]
    pub duration_s: u64,

    #[serde(default = "default_start_distance_m")]
    pub start_distance_m: f32,

    #[serde(default = "default_end_distance_m")]
    pub end_distance_m: f32,

    #[serde(default = "default_armed_after_ms")]
    pub armed_after_ms: u32,

    /// 0 disables MSP traffic
    #[serde(default = "default_msp_interval_ms")]
    pub msp_interval_ms: u32,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Diagnostic log output
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for daily log files; console only when unset
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_telemetry_ratio() -> u16 { 64 }

fn default_target_mw() -> u16 { 250 }
fn default_min_mw() -> u16 { 10 }
fn default_dynamic_power() -> bool { true }

fn default_duration_s() -> u64 { 60 }
fn default_start_distance_m() -> f32 { 10.0 }
fn default_end_distance_m() -> f32 { 3000.0 }
fn default_armed_after_ms() -> u32 { 1000 }
fn default_msp_interval_ms() -> u32 { 1000 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

fn default_file_prefix() -> String { "elrs-link".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            air_rate: AirRate::default(),
            telemetry_ratio: default_telemetry_ratio(),
            switch_mode: SwitchMode::default(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            target_mw: default_target_mw(),
            min_mw: default_min_mw(),
            dynamic_power: default_dynamic_power(),
            boost_channel: 0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_s: default_duration_s(),
            start_distance_m: default_start_distance_m(),
            end_distance_m: default_end_distance_m(),
            armed_after_ms: default_armed_after_ms(),
            msp_interval_ms: default_msp_interval_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> LinkError {
    LinkError::InvalidConfig(msg.into())
}

impl PowerConfig {
    /// Configured power level
    pub fn target_level(&self) -> Result<PowerLevel> {
        PowerLevel::from_milliwatts(self.target_mw)
            .ok_or_else(|| invalid(format!("target_mw {} is not a supported power level", self.target_mw)))
    }

    /// Lowest level dynamic power may select
    pub fn min_level(&self) -> Result<PowerLevel> {
        PowerLevel::from_milliwatts(self.min_mw)
            .ok_or_else(|| invalid(format!("min_mw {} is not a supported power level", self.min_mw)))
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use elrs_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings handed to the dynamic power controller
    pub fn dynamic_power_config(&self) -> Result<DynamicPowerConfig> {
        Ok(DynamicPowerConfig {
            target: self.power.target_level()?,
            enabled: self.power.dynamic_power,
            boost_channel: self.power.boost_channel,
            telemetry_ratio: self.link.telemetry_ratio,
            rf: self.link.air_rate.rf_params(),
        })
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Telemetry ratio must divide the packet counter evenly
        let ratio = self.link.telemetry_ratio;
        if !(2..=128).contains(&ratio) || !ratio.is_power_of_two() {
            return Err(invalid("telemetry_ratio must be a power of two between 2 and 128"));
        }

        let target = self.power.target_level()?;
        let min = self.power.min_level()?;
        if min > target {
            return Err(invalid("min_mw must not exceed target_mw"));
        }

        if self.power.boost_channel > 4 {
            return Err(invalid("boost_channel must be between 0 (off) and 4 (AUX12)"));
        }

        if self.simulation.duration_s == 0 {
            return Err(invalid("duration_s must be greater than 0"));
        }

        for (name, value) in [
            ("start_distance_m", self.simulation.start_distance_m),
            ("end_distance_m", self.simulation.end_distance_m),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{} must be a non-negative distance", name)));
            }
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.logging.dir.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("logging dir cannot be empty when set"));
        }

        if self.logging.file_prefix.is_empty() {
            return Err(invalid("logging file_prefix cannot be empty"));
        }

        Ok(())
    }
}
