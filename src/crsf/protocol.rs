//! # CRSF Protocol Constants and Types
//!
//! Channel ranges and link statistics shared between the CRSF side of the
//! transmitter and the over-the-air codec.

/// Number of RC channels carried on the CRSF side
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Channel value range (11-bit: 0-2047)
pub const CRSF_CHANNEL_VALUE_MIN: u16 = 0;
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 2047;
pub const CRSF_CHANNEL_VALUE_CENTER: u16 = 1024;

/// Index of the first AUX channel (AUX1, the arm switch)
pub const CRSF_AUX1: usize = 4;

/// Index of AUX9, the base for boost channel selection
pub const CRSF_AUX9: usize = 12;

/// RC channels array type (16 channels, 11-bit values)
pub type RcChannels = [u16; CRSF_NUM_CHANNELS];

/// Link statistics telemetry data
///
/// RSSI fields use the CRSF wire convention: the magnitude of a negative
/// dBm value (a stored `70` means -70 dBm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatistics {
    /// Uplink RSSI (antenna 1) in -dBm
    pub uplink_rssi_1: u8,

    /// Uplink RSSI (antenna 2) in -dBm (diversity)
    pub uplink_rssi_2: u8,

    /// Uplink link quality (0-100%)
    pub uplink_lq: u8,

    /// Uplink SNR in dB
    pub uplink_snr: i8,

    /// Active antenna (0 or 1)
    pub active_antenna: u8,
}

impl LinkStatistics {
    /// RSSI of the antenna the receiver is currently using, in dBm
    ///
    /// Magnitudes beyond 128 saturate at -128 dBm.
    pub fn active_rssi_dbm(&self) -> i8 {
        let magnitude = if self.active_antenna == 0 {
            self.uplink_rssi_1
        } else {
            self.uplink_rssi_2
        };
        (-(magnitude as i16)).max(i8::MIN as i16) as i8
    }

    /// Store a dBm reading into the wire format of the given antenna field
    ///
    /// The field only holds magnitudes of non-positive readings, so anything
    /// above 0 dBm is stored as 0 dBm.
    pub fn rssi_to_wire(dbm: i8) -> u8 {
        dbm.min(0).unsigned_abs()
    }
}
