//! Deterministic free-space radio path.
//!
//! One `SimulatedRadio` models a single direction of the link: frames passed
//! to [`transmit`](RadioDriver::transmit) come out of
//! [`receive`](RadioDriver::receive) when the path delivers them, and the
//! signal accessors report what the receiving end measured.
//!
//! ```text
//! rssi = tx_dbm - (20 * log10(d) + 40.2) - fade
//! ```
//!
//! Delivery probability rises linearly across a window centred on the
//! receiver sensitivity. Losses are spread evenly with an accumulator rather
//! than drawn at random, so runs are reproducible.

use super::RadioDriver;
use crate::ota::OtaFrame;
use crate::power::PowerLevel;

/// Free-space path loss at 1 m, 2.4 GHz
const PATH_LOSS_1M_DB: f32 = 40.2;

/// Width of the delivery probability ramp around sensitivity
const DELIVERY_RAMP_DB: f32 = 6.0;

const NOISE_FLOOR_DBM: f32 = -112.0;

/// The second antenna sits this much below the first
const DIVERSITY_OFFSET_DB: f32 = 3.0;

/// Packets covered by the LQ figure
const LQ_WINDOW: u32 = 100;

#[derive(Debug, Clone)]
pub struct SimulatedRadio {
    power: PowerLevel,
    distance_m: f32,
    fade_db: f32,
    sensitivity_dbm: i8,
    inbox: Option<OtaFrame>,
    delivery_credit: f32,
    history: u128,
    packets: u32,
    last_rssi_dbm: f32,
}

impl SimulatedRadio {
    pub fn new(power: PowerLevel, sensitivity_dbm: i8, distance_m: f32) -> Self {
        Self {
            power,
            distance_m: distance_m.max(1.0),
            fade_db: 0.0,
            sensitivity_dbm,
            inbox: None,
            delivery_credit: 0.0,
            history: 0,
            packets: 0,
            last_rssi_dbm: sensitivity_dbm as f32,
        }
    }

    pub fn power(&self) -> PowerLevel {
        self.power
    }

    pub fn distance_m(&self) -> f32 {
        self.distance_m
    }

    /// Distances under 1 m are treated as 1 m
    pub fn set_distance(&mut self, distance_m: f32) {
        self.distance_m = distance_m.max(1.0);
    }

    /// Extra attenuation on top of free-space loss
    pub fn set_fade(&mut self, fade_db: f32) {
        self.fade_db = fade_db.max(0.0);
    }

    /// Signal level a packet sent now would arrive with
    pub fn path_rssi_dbm(&self) -> f32 {
        let path_loss = 20.0 * self.distance_m.log10() + PATH_LOSS_1M_DB;
        self.power.dbm() as f32 - path_loss - self.fade_db
    }

    fn delivery_probability(rssi_dbm: f32, sensitivity_dbm: i8) -> f32 {
        ((rssi_dbm - sensitivity_dbm as f32) / DELIVERY_RAMP_DB + 0.5).clamp(0.0, 1.0)
    }
}

impl RadioDriver for SimulatedRadio {
    fn transmit(&mut self, frame: &OtaFrame) {
        let rssi = self.path_rssi_dbm();
        self.last_rssi_dbm = rssi;

        self.delivery_credit += Self::delivery_probability(rssi, self.sensitivity_dbm);
        let delivered = self.delivery_credit >= 1.0;
        if delivered {
            self.delivery_credit -= 1.0;
            self.inbox = Some(*frame);
        }

        let mask = (1u128 << LQ_WINDOW) - 1;
        self.history = ((self.history << 1) | delivered as u128) & mask;
        self.packets = (self.packets + 1).min(LQ_WINDOW);
    }

    fn receive(&mut self) -> Option<OtaFrame> {
        self.inbox.take()
    }

    fn link_quality(&self) -> u8 {
        if self.packets == 0 {
            return 0;
        }
        (self.history.count_ones() * 100 / self.packets) as u8
    }

    fn rssi(&self, antenna: u8) -> i8 {
        let offset = if antenna == 0 { 0.0 } else { DIVERSITY_OFFSET_DB };
        (self.last_rssi_dbm - offset).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
    }

    fn snr(&self) -> i8 {
        (self.last_rssi_dbm - NOISE_FLOOR_DBM).round().clamp(-20.0, 30.0) as i8
    }

    fn set_power(&mut self, level: PowerLevel) {
        self.power = level;
    }
}
