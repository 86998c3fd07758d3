//! # Channel Data and Switch State
//!
//! [`ChannelFrame`] is the in-memory form of one tick of control data.
//! [`SwitchState`] tracks the eight digital switches the hybrid layout sends:
//! switch 0 (arm) rides in every frame, switches 1-7 share a round-robin slot
//! that always goes to the lowest-indexed switch whose value changed since it
//! was last sent.

use crate::crsf::convert::{crsf_to_bit, crsf_to_n};
use crate::crsf::protocol::{RcChannels, CRSF_AUX1, CRSF_CHANNEL_VALUE_CENTER, CRSF_NUM_CHANNELS};

/// Number of digital switches (AUX1-AUX8)
pub const N_SWITCHES: usize = 8;

/// Positions of switch 1, sent at 4-bit resolution
pub const SWITCH1_POSITIONS: u16 = 16;

/// Positions of switches 2-7 (three-position switches)
pub const SWITCH_POSITIONS: u16 = 3;

/// One tick of channel data: 4 analog sticks followed by AUX channels,
/// all in the 11-bit CRSF range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFrame {
    pub channels: RcChannels,
}

impl Default for ChannelFrame {
    fn default() -> Self {
        Self {
            channels: [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS],
        }
    }
}

impl ChannelFrame {
    /// Create a frame from raw channel values
    pub fn new(channels: RcChannels) -> Self {
        Self { channels }
    }
}

/// Transmitter-side switch bookkeeping for the round-robin slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchState {
    current: [u8; N_SWITCHES],
    sent: [u8; N_SWITCHES],
    next_index: usize,
}

impl Default for SwitchState {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchState {
    /// All switches low, nothing pending, round-robin starting at switch 1
    pub fn new() -> Self {
        Self {
            current: [0; N_SWITCHES],
            sent: [0; N_SWITCHES],
            next_index: 1,
        }
    }

    /// Sample switch values from the AUX channels of `frame`
    ///
    /// AUX1 becomes a single bit, AUX2 a 16-position value, AUX3-AUX8
    /// three-position values.
    pub fn update_from_channels(&mut self, frame: &ChannelFrame) {
        let aux = &frame.channels[CRSF_AUX1..CRSF_AUX1 + N_SWITCHES];

        self.current[0] = crsf_to_bit(aux[0]);
        self.current[1] = crsf_to_n(aux[1], SWITCH1_POSITIONS);
        for i in 2..N_SWITCHES {
            self.current[i] = crsf_to_n(aux[i], SWITCH_POSITIONS);
        }
    }

    /// Set a switch directly, masking the value to the width its slot carries
    pub fn set(&mut self, index: usize, value: u8) {
        self.current[index] = match index {
            0 => value & 0b1,
            1 => value & 0b1111,
            _ => value & 0b11,
        };
    }

    /// Current value of a switch
    pub fn current(&self, index: usize) -> u8 {
        self.current[index]
    }

    /// Whether a switch differs from what was last sent for it
    pub fn is_changed(&self, index: usize) -> bool {
        self.current[index] != self.sent[index]
    }

    /// Pick the switch for this frame's round-robin slot
    ///
    /// Returns the lowest changed switch in 1..8; with nothing changed, the
    /// round-robin pointer. Either way the pointer advances past the pick,
    /// wrapping from 7 back to 1.
    pub fn next_switch_index(&mut self) -> usize {
        let index = (1..N_SWITCHES)
            .find(|&i| self.is_changed(i))
            .unwrap_or(self.next_index);

        self.next_index = index % (N_SWITCHES - 1) + 1;
        index
    }

    /// Record the value just sent for a switch
    pub fn set_sent(&mut self, index: usize, value: u8) {
        self.sent[index] = value;
    }
}
