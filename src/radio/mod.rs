//! # Radio Module
//!
//! The radio driver seam used by the link, and a simulated radio for running
//! the link on a host.
//!
//! This module handles:
//! - Transmitting and receiving OTA frames
//! - Per-packet signal measurements (RSSI per antenna, SNR, LQ)
//! - Applying the transmit power chosen by the power controller

pub mod simulated;

pub use simulated::SimulatedRadio;

use crate::crsf::protocol::LinkStatistics;
use crate::ota::OtaFrame;
use crate::power::PowerLevel;

/// Radio driver operations
pub trait RadioDriver {
    /// Send one frame
    fn transmit(&mut self, frame: &OtaFrame);

    /// Take the frame received since the last call, if any
    fn receive(&mut self) -> Option<OtaFrame>;

    /// Percentage of recent packets received
    fn link_quality(&self) -> u8;

    /// RSSI of the last packet on `antenna` (0 or 1), in dBm
    fn rssi(&self, antenna: u8) -> i8;

    /// SNR of the last packet, in dB
    fn snr(&self) -> i8;

    fn set_power(&mut self, level: PowerLevel);

    /// Uplink statistics as reported in telemetry
    ///
    /// The active antenna is the stronger of the two.
    fn link_statistics(&self) -> LinkStatistics {
        let (rssi_1, rssi_2) = (self.rssi(0), self.rssi(1));
        LinkStatistics {
            uplink_rssi_1: LinkStatistics::rssi_to_wire(rssi_1),
            uplink_rssi_2: LinkStatistics::rssi_to_wire(rssi_2),
            uplink_lq: self.link_quality(),
            uplink_snr: self.snr(),
            active_antenna: u8::from(rssi_2 > rssi_1),
            ..Default::default()
        }
    }
}
