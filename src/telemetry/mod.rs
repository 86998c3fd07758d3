//! # Telemetry Module
//!
//! Handles telemetry logging to JSONL files with rotation.
//!
//! This module handles:
//! - One record per received link statistics report
//! - Formatting as JSONL (JSON Lines)
//! - Rotating files after N records
//! - Retaining only the last M files

pub mod logger;

pub use logger::{TelemetryLogger, TelemetryRecord};
