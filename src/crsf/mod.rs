//! # CRSF Protocol Module
//!
//! The CRSF side of the link: the 16-channel, 11-bit value space the
//! over-the-air codec maps into and out of.
//!
//! This module handles:
//! - Channel range constants and link statistics telemetry
//! - Bit and N-position conversions used by the switch encoders
//! - CRC8-DVB-S2 checksum calculation

pub mod protocol;
pub mod convert;
pub mod crc;
