//! # Link Module
//!
//! The two ends of the link, generic over the switch layout so the layout
//! chosen at startup is fixed for the life of the link.
//!
//! This module handles:
//! - Transmitter: channel sampling, RC/MSP frame scheduling, telemetry
//!   bookkeeping and dynamic power
//! - Receiver: frame decoding, MSP forwarding in v2 framing, link statistics
//!   reporting on the downlink

pub mod receiver;
pub mod transmitter;

pub use receiver::{Receiver, RxEvent};
pub use transmitter::Transmitter;

/// Time without telemetry after which the receiver counts as lost
pub const CONNECTION_TIMEOUT_MS: u32 = 1500;
