//! # Over-The-Air Frame Module
//!
//! Packs one radio tick's worth of control data into the fixed 7-byte frame
//! sent over the air, and unpacks it on the receiving end.
//!
//! ## Frame Layout
//!
//! | Byte | RC_DATA | MSP_DATA |
//! |------|---------|----------|
//! | 0 | bits[1:0] = type | bits[1:0] = type |
//! | 1-4 | CH1-CH4 bits 10..3 | function, payload size, payload[0..2] |
//! | 5 | CH1-CH4 bits 2..1 | payload[2] |
//! | 6 | switch byte (layout dependent) | payload[3] |
//!
//! Analog channels travel at 10-bit resolution: the least significant bit of
//! the 11-bit CRSF value is dropped on encode and reads back as zero.
//!
//! Everything here runs in the radio interrupt: no allocation, no locking,
//! no logging on the RC path.

pub mod channels;
pub mod fixed;
pub mod hybrid;
pub mod link_stats;
pub mod msp;
pub mod packer;

use crate::crsf::protocol::CRSF_CHANNEL_VALUE_MAX;
use channels::ChannelFrame;

/// Size of every over-the-air frame
pub const OTA_FRAME_SIZE: usize = 7;

/// One over-the-air frame
pub type OtaFrame = [u8; OTA_FRAME_SIZE];

/// 2-bit frame type carried in byte 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketHeaderType {
    /// Channel data
    RcData = 0b00,
    /// Compact MSP command
    MspData = 0b01,
    /// Sync packet (reserved here)
    Sync = 0b10,
    /// Downlink telemetry
    Telemetry = 0b11,
}

impl PacketHeaderType {
    /// Decode the two low bits of a header byte
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::RcData,
            0b01 => Self::MspData,
            0b10 => Self::Sync,
            _ => Self::Telemetry,
        }
    }
}

/// Frame type of a received buffer
pub fn frame_type(frame: &OtaFrame) -> PacketHeaderType {
    PacketHeaderType::from_bits(frame[0])
}

/// Pack CH1-CH4 into bytes 1..=5 (10 bits each)
#[inline(always)]
pub(crate) fn pack_analog(frame: &ChannelFrame, buffer: &mut OtaFrame) {
    let ch = |i: usize| frame.channels[i].min(CRSF_CHANNEL_VALUE_MAX);

    buffer[1] = (ch(0) >> 3) as u8;
    buffer[2] = (ch(1) >> 3) as u8;
    buffer[3] = (ch(2) >> 3) as u8;
    buffer[4] = (ch(3) >> 3) as u8;
    buffer[5] = (((ch(0) & 0b110) << 5)
        | ((ch(1) & 0b110) << 3)
        | ((ch(2) & 0b110) << 1)
        | ((ch(3) & 0b110) >> 1)) as u8;
}

/// Unpack CH1-CH4 from bytes 1..=5
#[inline(always)]
pub(crate) fn unpack_analog(buffer: &OtaFrame, out: &mut ChannelFrame) {
    let low = buffer[5] as u16;

    out.channels[0] = ((buffer[1] as u16) << 3) | ((low & 0b1100_0000) >> 5);
    out.channels[1] = ((buffer[2] as u16) << 3) | ((low & 0b0011_0000) >> 3);
    out.channels[2] = ((buffer[3] as u16) << 3) | ((low & 0b0000_1100) >> 1);
    out.channels[3] = ((buffer[4] as u16) << 3) | ((low & 0b0000_0011) << 1);
}
