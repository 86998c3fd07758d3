//! # Channel Packer Strategy
//!
//! The switch layout in byte 6 is chosen once at startup from configuration.
//! Callers are generic over [`ChannelPacker`], so the chosen layout is
//! monomorphized into the transmit/receive path and the interrupt-time code
//! never branches on it.

use serde::Deserialize;

use super::channels::{ChannelFrame, SwitchState};
use super::OtaFrame;

/// Switch layout selected in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    /// 1-bit arm switch plus a round-robin slot for switches 1-7
    #[default]
    Hybrid,
    /// Eight 1-bit switches (legacy 12-channel mode)
    Fixed,
}

/// Packs and unpacks RC_DATA frames for one switch layout
pub trait ChannelPacker {
    /// Short name used in logs
    const NAME: &'static str;

    /// Build an RC_DATA frame
    ///
    /// Advances the round-robin pointer in `switches` and records the value
    /// sent, when the layout uses them. `telemetry_status` is carried only by
    /// layouts that have room for it.
    fn pack(
        &self,
        frame: &ChannelFrame,
        switches: &mut SwitchState,
        telemetry_status: bool,
    ) -> OtaFrame;

    /// Apply a received RC_DATA frame to `out`, returning the telemetry status bit
    ///
    /// Channels not carried by this frame keep their previous values.
    fn unpack(&self, buffer: &OtaFrame, out: &mut ChannelFrame) -> bool;
}
