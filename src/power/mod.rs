//! # Power Module
//!
//! Transmit power management for the link.
//!
//! This module handles:
//! - Power levels and the clamping power manager ([`level`])
//! - Link quality and RSSI averaging ([`estimator`])
//! - The telemetry-driven dynamic power controller ([`dynamic`])

pub mod dynamic;
pub mod estimator;
pub mod level;

pub use dynamic::{DynamicPower, DynamicPowerConfig, LinkInputs, PowerDecision, TelemetrySignal};
pub use estimator::LinkQualityEstimator;
pub use level::{PowerLevel, PowerManagement, PowerManager};
