//! # Hybrid Switch Layout
//!
//! Byte 6 of an RC_DATA frame:
//!
//! ```text
//!   7      6       5..3          2..0
//! [TLM] [SW0] [switch index] [switch value]
//! ```
//!
//! Switch 1 is sent with 4 bits of value: its index is cleared to 0 so the
//! top value bit can spill into the low index bit. The receiver therefore
//! treats index 0 and 1 alike. Switches 2-7 carry three-position values.

use super::channels::{ChannelFrame, SwitchState};
use super::packer::ChannelPacker;
use super::{pack_analog, unpack_analog, OtaFrame, PacketHeaderType, OTA_FRAME_SIZE};
use crate::crsf::convert::{bit_to_crsf, n_to_crsf, switch2b_to_crsf};
use crate::crsf::protocol::CRSF_AUX1;

/// Hybrid 8-switch packer
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridSwitches;

impl ChannelPacker for HybridSwitches {
    const NAME: &'static str = "hybrid";

    fn pack(
        &self,
        frame: &ChannelFrame,
        switches: &mut SwitchState,
        telemetry_status: bool,
    ) -> OtaFrame {
        let mut buffer = [0u8; OTA_FRAME_SIZE];
        buffer[0] = PacketHeaderType::RcData as u8;
        pack_analog(frame, &mut buffer);

        let index = switches.next_switch_index() as u8;
        // Index 1 goes out as 0; its value's high bit fills the gap
        let wire_index = index & !((index == 1) as u8);
        let value = switches.current(index as usize);

        buffer[6] = (telemetry_status as u8) << 7
            | switches.current(0) << 6
            | wire_index << 3
            | value;

        switches.set_sent(index as usize, value);
        buffer
    }

    fn unpack(&self, buffer: &OtaFrame, out: &mut ChannelFrame) -> bool {
        unpack_analog(buffer, out);

        let switch_byte = buffer[6];
        out.channels[CRSF_AUX1] = bit_to_crsf(switch_byte >> 6);

        let index = ((switch_byte >> 3) & 0b111) as usize;
        match index {
            0 | 1 => {
                out.channels[CRSF_AUX1 + 1] = n_to_crsf((switch_byte & 0b1111) as u16, 15);
            }
            _ => {
                out.channels[CRSF_AUX1 + index] = switch2b_to_crsf(switch_byte & 0b111);
            }
        }

        switch_byte >> 7 != 0
    }
}
