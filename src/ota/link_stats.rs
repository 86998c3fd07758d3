//! # Downlink Link Statistics
//!
//! The receiver reports its view of the uplink in a telemetry frame sent in
//! the downlink slot:
//!
//! ```text
//! [type=TLM] [0x01] [rssi ant1] [rssi ant2] [snr] [antenna<<7 | lq] [0]
//! ```
//!
//! RSSI bytes use the CRSF magnitude convention. LQ is 0..=100, so it fits
//! in seven bits next to the active antenna flag.

use super::{frame_type, OtaFrame, PacketHeaderType, OTA_FRAME_SIZE};
use crate::crsf::protocol::LinkStatistics;

/// Telemetry subtype for link statistics
pub const TLM_TYPE_LINK: u8 = 0x01;

pub fn pack_link_stats_frame(stats: &LinkStatistics) -> OtaFrame {
    let mut buffer = [0u8; OTA_FRAME_SIZE];
    buffer[0] = PacketHeaderType::Telemetry as u8;
    buffer[1] = TLM_TYPE_LINK;
    buffer[2] = stats.uplink_rssi_1;
    buffer[3] = stats.uplink_rssi_2;
    buffer[4] = stats.uplink_snr as u8;
    buffer[5] = ((stats.active_antenna & 1) << 7) | stats.uplink_lq.min(100);
    buffer
}

/// Decode a link statistics frame, or `None` for any other frame
pub fn unpack_link_stats_frame(buffer: &OtaFrame) -> Option<LinkStatistics> {
    if frame_type(buffer) != PacketHeaderType::Telemetry || buffer[1] != TLM_TYPE_LINK {
        return None;
    }

    Some(LinkStatistics {
        uplink_rssi_1: buffer[2],
        uplink_rssi_2: buffer[3],
        uplink_snr: buffer[4] as i8,
        active_antenna: buffer[5] >> 7,
        uplink_lq: buffer[5] & 0x7F,
        ..Default::default()
    })
}
