//! # ELRS Link Library
//!
//! ExpressLRS-style radio link layer: the over-the-air channel codec, MSP
//! framing, and telemetry-driven transmit power control.
//!
//! This library provides the pieces both ends of the link share, plus a
//! host-side simulator that runs a transmitter and receiver against a
//! modelled radio path.

pub mod config;
pub mod error;
pub mod crsf;
pub mod ota;
pub mod msp;
pub mod power;
pub mod radio;
pub mod link;
pub mod sim;
pub mod telemetry;
