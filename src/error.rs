//! # Error Types
//!
//! Custom error types for the ELRS link layer using `thiserror`.
//!
//! The interrupt-time codecs never fail; errors only surface at the edges
//! (configuration, log files, and MSP frames that do not fit the OTA slot).

use thiserror::Error;

/// Main error type for the link layer
#[derive(Debug, Error)]
pub enum LinkError {
    /// MSP payload does not fit the compact OTA frame
    #[error("MSP payload of {size} bytes exceeds the {max}-byte OTA limit")]
    MspPayloadTooLarge { size: usize, max: usize },

    /// MSP function id wider than the one-byte OTA field
    #[error("MSP function 0x{function:04X} does not fit the one-byte OTA field")]
    MspFunctionTooLarge { function: u16 },

    /// Configuration parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values that parse but are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Telemetry record serialization errors
    #[error("Telemetry encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the link layer
pub type Result<T> = std::result::Result<T, LinkError>;
