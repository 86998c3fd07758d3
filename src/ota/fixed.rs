//! # Fixed Switch Layout
//!
//! Legacy 12-channel mode: byte 6 carries AUX1-AUX8 as one bit each, AUX1 in
//! bit 7 down to AUX8 in bit 0. No round-robin and no telemetry status bit.

use super::channels::{ChannelFrame, SwitchState};
use super::packer::ChannelPacker;
use super::{pack_analog, unpack_analog, OtaFrame, PacketHeaderType, OTA_FRAME_SIZE};
use crate::crsf::convert::{bit_to_crsf, crsf_to_bit};
use crate::crsf::protocol::CRSF_AUX1;

/// Number of single-bit switches in byte 6
const FIXED_SWITCHES: usize = 8;

/// Fixed 8 x 1-bit packer
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSwitches;

impl ChannelPacker for FixedSwitches {
    const NAME: &'static str = "fixed";

    fn pack(
        &self,
        frame: &ChannelFrame,
        _switches: &mut SwitchState,
        _telemetry_status: bool,
    ) -> OtaFrame {
        let mut buffer = [0u8; OTA_FRAME_SIZE];
        buffer[0] = PacketHeaderType::RcData as u8;
        pack_analog(frame, &mut buffer);

        buffer[6] = (0..FIXED_SWITCHES).fold(0u8, |byte, i| {
            byte | crsf_to_bit(frame.channels[CRSF_AUX1 + i]) << (7 - i)
        });

        buffer
    }

    fn unpack(&self, buffer: &OtaFrame, out: &mut ChannelFrame) -> bool {
        unpack_analog(buffer, out);

        for i in 0..FIXED_SWITCHES {
            out.channels[CRSF_AUX1 + i] = bit_to_crsf(buffer[6] >> (7 - i));
        }

        false
    }
}
