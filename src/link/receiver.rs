//! Receiver side of the link.

use bytes::Bytes;
use tracing::debug;

use crate::crsf::protocol::LinkStatistics;
use crate::msp::parser::MspParser;
use crate::msp::MspPacket;
use crate::ota::channels::ChannelFrame;
use crate::ota::link_stats::pack_link_stats_frame;
use crate::ota::msp::unpack_msp_frame;
use crate::ota::packer::ChannelPacker;
use crate::ota::{frame_type, OtaFrame, PacketHeaderType};
use crate::radio::RadioDriver;

/// Outcome of handling one received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxEvent {
    /// Channel data applied
    Channels,
    /// MSP command, serialized in v2 framing for the flight controller
    Msp(Bytes),
    /// Frame type this end does not consume
    Ignored,
}

/// Receiver state for one link
#[derive(Debug)]
pub struct Receiver<P: ChannelPacker> {
    packer: P,
    channels: ChannelFrame,
    msp: MspPacket,
    telemetry_confirmed: bool,
}

impl<P: ChannelPacker> Receiver<P> {
    pub fn new(packer: P) -> Self {
        Self {
            packer,
            channels: ChannelFrame::default(),
            msp: MspPacket::new(),
            telemetry_confirmed: false,
        }
    }

    /// Decode one frame
    pub fn handle_frame(&mut self, buffer: &OtaFrame) -> RxEvent {
        match frame_type(buffer) {
            PacketHeaderType::RcData => {
                self.telemetry_confirmed = self.packer.unpack(buffer, &mut self.channels);
                RxEvent::Channels
            }
            PacketHeaderType::MspData => {
                unpack_msp_frame(buffer, &mut self.msp);
                match MspParser::serialize(&self.msp) {
                    Some(bytes) => RxEvent::Msp(bytes),
                    None => RxEvent::Ignored,
                }
            }
            other => {
                debug!("Ignoring {:?} frame on uplink", other);
                RxEvent::Ignored
            }
        }
    }

    /// Handle whatever `radio` received since the last poll
    pub fn poll<R: RadioDriver>(&mut self, radio: &mut R) -> Option<RxEvent> {
        radio.receive().map(|buffer| self.handle_frame(&buffer))
    }

    /// Report uplink statistics in the downlink slot
    pub fn send_link_stats<R: RadioDriver>(&self, radio: &mut R, stats: &LinkStatistics) {
        radio.transmit(&pack_link_stats_frame(stats));
    }

    pub fn channels(&self) -> &ChannelFrame {
        &self.channels
    }

    /// Telemetry confirmation bit from the last channel frame
    pub fn telemetry_confirmed(&self) -> bool {
        self.telemetry_confirmed
    }
}
