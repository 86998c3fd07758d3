//! # Dynamic Power Controller
//!
//! Adjusts transmit power from uplink telemetry once per update tick.
//!
//! ## Decision order
//!
//! Each tick consumes the pending [`TelemetrySignal`] and walks these steps,
//! stopping at the first one that acts:
//!
//! 1. Overload: RSSI at or above -5 dBm steps power down
//! 2. Dynamic power disabled: weak RSSI restores the configured power
//! 3. Forced boost: disconnected while armed, or boost switch low
//! 4. Missed telemetry while armed: one step up per late interval
//! 5. No new telemetry: hold
//! 6. Sudden or critical LQ drop: jump to the configured power
//! 7. Fine adjustment on averaged RSSI or on SNR, per air rate
//!
//! Step 3 overrides step 1 within the same tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::estimator::LinkQualityEstimator;
use super::level::{PowerLevel, PowerManagement};
use crate::crsf::convert::crsf_to_bit;
use crate::crsf::protocol::{LinkStatistics, RcChannels, CRSF_AUX9};

/// RSSI at or above this saturates the receiver front end
const OVERLOAD_RSSI_DBM: i8 = -5;

/// With dynamic power off, RSSI at or below this restores the configured power
const DISABLED_RESET_RSSI_DBM: i8 = -20;

/// Relative LQ drop that triggers an emergency boost
const BOOST_LQ_THRESHOLD: i32 = 20;

/// Absolute LQ floor that triggers an emergency boost
const BOOST_LQ_MIN: u8 = 50;

/// LQ average required before power may be lowered
const MIN_LQ_FOR_DECREASE: u8 = 95;

/// RSSI samples needed before the mean is acted on
const RSSI_MIN_SAMPLES: usize = 5;

/// Margins over receiver sensitivity for RSSI mode, in dB
const RSSI_UP_MARGIN_DB: i16 = 15;
const RSSI_DOWN_MARGIN_DB: i16 = 30;

/// SNR gained per power step, in dB
const SNR_GAIN_PER_STEP_DB: i8 = 2;

/// Shortest telemetry interval considered for missed-telemetry boosts
const MIN_TELEMETRY_INTERVAL_MS: u32 = 512;

/// Slack added to the telemetry interval
const TELEMETRY_MARGIN_MS: u32 = 2;

/// Telemetry arrival since the previous tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetrySignal {
    /// Nothing arrived and nothing was due
    #[default]
    NoUpdate,
    /// Fresh link statistics
    NewLinkStats(LinkStatistics),
    /// Expected telemetry did not arrive
    Missed,
}

/// Receiver connection as seen by the transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

/// Fine adjustment strategy for an air rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynPowerMode {
    /// Compare averaged RSSI against receiver sensitivity
    Rssi,
    /// Compare SNR against fixed thresholds (dB)
    Snr { up: i8, down: i8 },
}

/// RF performance parameters of one air rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfPerfParams {
    /// Time between uplink packets
    pub interval_us: u32,
    /// Receiver sensitivity in dBm
    pub sensitivity_dbm: i8,
    pub mode: DynPowerMode,
}

/// Supported air rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum AirRate {
    #[serde(rename = "500hz")]
    Hz500,
    #[default]
    #[serde(rename = "250hz")]
    Hz250,
    #[serde(rename = "150hz")]
    Hz150,
    #[serde(rename = "50hz")]
    Hz50,
    #[serde(rename = "flrc1000hz")]
    Flrc1000Hz,
    #[serde(rename = "flrc500hz")]
    Flrc500Hz,
}

impl AirRate {
    pub fn rf_params(self) -> RfPerfParams {
        match self {
            AirRate::Hz500 => RfPerfParams {
                interval_us: 2000,
                sensitivity_dbm: -105,
                mode: DynPowerMode::Rssi,
            },
            AirRate::Hz250 => RfPerfParams {
                interval_us: 4000,
                sensitivity_dbm: -108,
                mode: DynPowerMode::Rssi,
            },
            AirRate::Hz150 => RfPerfParams {
                interval_us: 6666,
                sensitivity_dbm: -112,
                mode: DynPowerMode::Rssi,
            },
            AirRate::Hz50 => RfPerfParams {
                interval_us: 20000,
                sensitivity_dbm: -115,
                mode: DynPowerMode::Rssi,
            },
            AirRate::Flrc1000Hz => RfPerfParams {
                interval_us: 1000,
                sensitivity_dbm: -104,
                mode: DynPowerMode::Snr { up: 5, down: 10 },
            },
            AirRate::Flrc500Hz => RfPerfParams {
                interval_us: 2000,
                sensitivity_dbm: -104,
                mode: DynPowerMode::Snr { up: 4, down: 10 },
            },
        }
    }
}

impl fmt::Display for AirRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AirRate::Hz500 => "500Hz",
            AirRate::Hz250 => "250Hz",
            AirRate::Hz150 => "150Hz",
            AirRate::Hz50 => "50Hz",
            AirRate::Flrc1000Hz => "F1000",
            AirRate::Flrc500Hz => "F500",
        };
        f.write_str(name)
    }
}

/// Read-only settings the controller consults every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicPowerConfig {
    /// Configured power, also the ceiling for automatic increases
    pub target: PowerLevel,
    pub enabled: bool,
    /// 0 = off, 1..=4 selects AUX9..AUX12
    pub boost_channel: u8,
    /// Uplink packets per telemetry packet
    pub telemetry_ratio: u16,
    pub rf: RfPerfParams,
}

impl DynamicPowerConfig {
    /// Time after the last telemetry beyond which it counts as overdue
    pub fn telemetry_timeout_ms(&self) -> u32 {
        let interval_ms = self.telemetry_ratio as u32 * self.rf.interval_us / 1000;
        interval_ms.max(MIN_TELEMETRY_INTERVAL_MS) + TELEMETRY_MARGIN_MS
    }
}

/// Vehicle and link state sampled for one tick
#[derive(Debug, Clone, Copy)]
pub struct LinkInputs<'a> {
    pub now_ms: u32,
    pub armed: bool,
    pub connection: ConnectionState,
    pub channels: &'a RcChannels,
}

/// What a tick did to the power level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerDecision {
    Hold,
    Overload,
    ResetToTarget,
    ForcedBoost,
    MissedTelemetry,
    EmergencyBoost,
    Increase(u8),
    Decrease,
}

/// Telemetry-driven power controller
#[derive(Debug, Clone)]
pub struct DynamicPower {
    config: DynamicPowerConfig,
    estimator: LinkQualityEstimator,
    pending: TelemetrySignal,
    last_telemetry_ms: u32,
}

impl DynamicPower {
    pub fn new(config: DynamicPowerConfig) -> Self {
        Self {
            config,
            estimator: LinkQualityEstimator::new(100),
            pending: TelemetrySignal::NoUpdate,
            last_telemetry_ms: 0,
        }
    }

    /// Reseed averages and restart the telemetry clock at `now_ms`
    pub fn reset(&mut self, now_ms: u32) {
        self.estimator.init(100);
        self.pending = TelemetrySignal::NoUpdate;
        self.last_telemetry_ms = now_ms;
    }

    pub fn config(&self) -> &DynamicPowerConfig {
        &self.config
    }

    pub fn estimator(&self) -> &LinkQualityEstimator {
        &self.estimator
    }

    pub fn last_telemetry_ms(&self) -> u32 {
        self.last_telemetry_ms
    }

    /// Record telemetry arrival for the next tick
    ///
    /// Only the latest signal is kept.
    pub fn telemetry_update(&mut self, signal: TelemetrySignal, now_ms: u32) {
        if let TelemetrySignal::NewLinkStats(_) = signal {
            self.last_telemetry_ms = now_ms;
        }
        self.pending = signal;
    }

    /// Run one controller tick
    pub fn update(&mut self, inputs: &LinkInputs<'_>, power: &mut impl PowerManagement) -> PowerDecision {
        let signal = std::mem::take(&mut self.pending);
        let stats = match signal {
            TelemetrySignal::NewLinkStats(stats) => Some(stats),
            _ => None,
        };
        let rssi = stats.map(|s| s.active_rssi_dbm());

        let overloaded = matches!(rssi, Some(r) if r >= OVERLOAD_RSSI_DBM);
        if overloaded {
            debug!("-power (overload)");
            power.dec_level();
        }

        if !self.config.enabled {
            if !overloaded && matches!(rssi, Some(r) if r <= DISABLED_RESET_RSSI_DBM) {
                power.set_level(self.config.target);
                return PowerDecision::ResetToTarget;
            }
            return if overloaded {
                PowerDecision::Overload
            } else {
                PowerDecision::Hold
            };
        }

        if (inputs.connection == ConnectionState::Disconnected && inputs.armed) || self.boost_switch_low(inputs.channels) {
            debug!("boost to {}", self.config.target);
            power.set_level(self.config.target);
            return PowerDecision::ForcedBoost;
        }

        if overloaded {
            return PowerDecision::Overload;
        }

        let stats = match signal {
            TelemetrySignal::Missed => {
                let elapsed = inputs.now_ms.wrapping_sub(self.last_telemetry_ms);
                if inputs.armed && elapsed > self.config.telemetry_timeout_ms() && self.headroom(power) > 0 {
                    debug!("+power (tlm)");
                    power.inc_level();
                    return PowerDecision::MissedTelemetry;
                }
                return PowerDecision::Hold;
            }
            TelemetrySignal::NoUpdate => return PowerDecision::Hold,
            TelemetrySignal::NewLinkStats(stats) => stats,
        };

        let lq = stats.uplink_lq;
        let lq_diff = self.estimator.current_lq_average() as i32 - lq as i32;
        self.estimator.add_link_quality(lq);
        if lq_diff >= BOOST_LQ_THRESHOLD || lq <= BOOST_LQ_MIN {
            debug!("LQ {} (drop {}), boost to {}", lq, lq_diff, self.config.target);
            power.set_level(self.config.target);
            return PowerDecision::EmergencyBoost;
        }

        let lq_good = self.estimator.current_lq_average() >= MIN_LQ_FOR_DECREASE;
        match self.config.rf.mode {
            DynPowerMode::Rssi => {
                self.estimator.add_rssi(stats.active_rssi_dbm());
                if self.estimator.rssi_sample_count() < RSSI_MIN_SAMPLES {
                    return PowerDecision::Hold;
                }
                let Some(mean) = self.estimator.mean_rssi() else {
                    return PowerDecision::Hold;
                };

                let sensitivity = self.config.rf.sensitivity_dbm as i16;
                let mean = mean as i16;
                if mean < sensitivity + RSSI_UP_MARGIN_DB && self.headroom(power) > 0 {
                    debug!("+power (rssi {})", mean);
                    power.inc_level();
                    PowerDecision::Increase(1)
                } else if mean > sensitivity + RSSI_DOWN_MARGIN_DB && lq_good {
                    debug!("-power (rssi {})", mean);
                    power.dec_level();
                    PowerDecision::Decrease
                } else {
                    PowerDecision::Hold
                }
            }
            DynPowerMode::Snr { up, down } => {
                let mut snr = stats.uplink_snr;
                let mut decision = PowerDecision::Hold;
                if snr >= down && lq_good {
                    debug!("-power (snr {})", snr);
                    power.dec_level();
                    decision = PowerDecision::Decrease;
                }

                let mut headroom = self.headroom(power);
                let mut steps = 0u8;
                while snr <= up && headroom > 0 {
                    debug!("+power (snr {})", snr);
                    power.inc_level();
                    snr = snr.saturating_add(SNR_GAIN_PER_STEP_DB);
                    headroom -= 1;
                    steps += 1;
                }
                if steps > 0 {
                    decision = PowerDecision::Increase(steps);
                }
                decision
            }
        }
    }

    fn headroom(&self, power: &impl PowerManagement) -> u8 {
        self.config.target.index().saturating_sub(power.current_level().index())
    }

    fn boost_switch_low(&self, channels: &RcChannels) -> bool {
        match self.config.boost_channel {
            0 => false,
            n => channels
                .get(CRSF_AUX9 + n as usize - 1)
                .is_some_and(|&value| crsf_to_bit(value) == 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crsf::protocol::{CRSF_CHANNEL_VALUE_CENTER, CRSF_CHANNEL_VALUE_MAX, CRSF_CHANNEL_VALUE_MIN, CRSF_NUM_CHANNELS};
    use crate::power::level::{MockPowerManagement, PowerManager};
    use mockall::predicate::eq;

    const HIGH: RcChannels = [CRSF_CHANNEL_VALUE_MAX; CRSF_NUM_CHANNELS];

    fn config(mode: DynPowerMode) -> DynamicPowerConfig {
        DynamicPowerConfig {
            target: PowerLevel::Mw250,
            enabled: true,
            boost_channel: 0,
            telemetry_ratio: 64,
            rf: RfPerfParams {
                interval_us: 2000,
                sensitivity_dbm: -105,
                mode,
            },
        }
    }

    fn stats(rssi: i8, lq: u8, snr: i8) -> LinkStatistics {
        LinkStatistics {
            uplink_rssi_1: LinkStatistics::rssi_to_wire(rssi),
            uplink_lq: lq,
            uplink_snr: snr,
            ..Default::default()
        }
    }

    fn inputs(now_ms: u32, armed: bool, connection: ConnectionState) -> LinkInputs<'static> {
        LinkInputs {
            now_ms,
            armed,
            connection,
            channels: &HIGH,
        }
    }

    fn connected(now_ms: u32) -> LinkInputs<'static> {
        inputs(now_ms, true, ConnectionState::Connected)
    }

    #[test]
    fn test_telemetry_timeout_floor() {
        let cfg = config(DynPowerMode::Rssi);
        // 64 * 2 ms = 128 ms, floored at 512
        assert_eq!(cfg.telemetry_timeout_ms(), 514);

        let slow = DynamicPowerConfig {
            telemetry_ratio: 64,
            rf: AirRate::Hz50.rf_params(),
            ..cfg
        };
        assert_eq!(slow.telemetry_timeout_ms(), 64 * 20 + 2);
    }

    #[test]
    fn test_overload_single_decrement() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_dec_level().times(1).return_const(());
        power.expect_inc_level().never();
        power.expect_set_level().never();
        power.expect_current_level().return_const(PowerLevel::Mw100);

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-3, 100, 0)), 0);
        let decision = dynpower.update(&connected(0), &mut power);

        assert_eq!(decision, PowerDecision::Overload);
        // The overloaded sample does not feed the averages
        assert_eq!(dynpower.estimator().rssi_sample_count(), 0);
    }

    #[test]
    fn test_positive_rssi_counts_as_overload() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_dec_level().times(1).return_const(());
        power.expect_inc_level().never();
        power.expect_set_level().never();

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(10, 100, 0)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::Overload);
    }

    #[test]
    fn test_overload_applies_when_disabled() {
        let mut cfg = config(DynPowerMode::Rssi);
        cfg.enabled = false;
        let mut dynpower = DynamicPower::new(cfg);
        let mut power = MockPowerManagement::new();
        power.expect_dec_level().times(1).return_const(());
        power.expect_set_level().never();

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(0, 100, 0)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::Overload);
    }

    #[test]
    fn test_disabled_resets_on_weak_rssi() {
        let mut cfg = config(DynPowerMode::Rssi);
        cfg.enabled = false;
        let mut dynpower = DynamicPower::new(cfg);
        let mut power = MockPowerManagement::new();
        power.expect_set_level().with(eq(PowerLevel::Mw250)).times(1).return_const(());

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-20, 100, 0)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::ResetToTarget);
    }

    #[test]
    fn test_disabled_ignores_everything_else() {
        let mut cfg = config(DynPowerMode::Rssi);
        cfg.enabled = false;
        let mut dynpower = DynamicPower::new(cfg);
        // No expectations: any power call fails the test
        let mut power = MockPowerManagement::new();

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-19, 10, 0)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::Hold);

        dynpower.telemetry_update(TelemetrySignal::Missed, 5000);
        let disconnected = inputs(5000, true, ConnectionState::Disconnected);
        assert_eq!(dynpower.update(&disconnected, &mut power), PowerDecision::Hold);
    }

    #[test]
    fn test_disconnected_armed_forces_target_over_overload() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        let mut seq = mockall::Sequence::new();
        power.expect_dec_level().times(1).in_sequence(&mut seq).return_const(());
        power
            .expect_set_level()
            .with(eq(PowerLevel::Mw250))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-3, 100, 0)), 0);
        let disconnected = inputs(0, true, ConnectionState::Disconnected);
        assert_eq!(dynpower.update(&disconnected, &mut power), PowerDecision::ForcedBoost);
    }

    #[test]
    fn test_disconnected_armed_without_telemetry() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_set_level().with(eq(PowerLevel::Mw250)).times(1).return_const(());

        let disconnected = inputs(0, true, ConnectionState::Disconnected);
        assert_eq!(dynpower.update(&disconnected, &mut power), PowerDecision::ForcedBoost);
    }

    #[test]
    fn test_disconnected_disarmed_no_boost() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();

        let idle = inputs(0, false, ConnectionState::Disconnected);
        assert_eq!(dynpower.update(&idle, &mut power), PowerDecision::Hold);
    }

    #[test]
    fn test_boost_channel_low_forces_target() {
        let mut cfg = config(DynPowerMode::Rssi);
        cfg.boost_channel = 3;
        let mut dynpower = DynamicPower::new(cfg);
        let mut power = MockPowerManagement::new();
        power.expect_set_level().with(eq(PowerLevel::Mw250)).times(1).return_const(());

        let mut channels = HIGH;
        channels[CRSF_AUX9 + 2] = CRSF_CHANNEL_VALUE_MIN;
        let inputs = LinkInputs {
            now_ms: 0,
            armed: false,
            connection: ConnectionState::Connected,
            channels: &channels,
        };
        assert_eq!(dynpower.update(&inputs, &mut power), PowerDecision::ForcedBoost);
    }

    #[test]
    fn test_boost_channel_high_no_boost() {
        let mut cfg = config(DynPowerMode::Rssi);
        cfg.boost_channel = 4;
        let mut dynpower = DynamicPower::new(cfg);
        let mut power = MockPowerManagement::new();

        // Centre reads as high
        let channels = [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS];
        let inputs = LinkInputs {
            now_ms: 0,
            armed: true,
            connection: ConnectionState::Connected,
            channels: &channels,
        };
        assert_eq!(dynpower.update(&inputs, &mut power), PowerDecision::Hold);
    }

    #[test]
    fn test_missed_telemetry_waits_for_timeout() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        dynpower.reset(1000);
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw25);
        power.expect_inc_level().times(1).return_const(());

        dynpower.telemetry_update(TelemetrySignal::Missed, 1514);
        assert_eq!(dynpower.update(&connected(1514), &mut power), PowerDecision::Hold);

        dynpower.telemetry_update(TelemetrySignal::Missed, 1515);
        assert_eq!(dynpower.update(&connected(1515), &mut power), PowerDecision::MissedTelemetry);
    }

    #[test]
    fn test_missed_telemetry_requires_armed_and_headroom() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw250);
        power.expect_inc_level().never();

        dynpower.telemetry_update(TelemetrySignal::Missed, 10_000);
        let disarmed = inputs(10_000, false, ConnectionState::Connected);
        assert_eq!(dynpower.update(&disarmed, &mut power), PowerDecision::Hold);

        // Already at target
        dynpower.telemetry_update(TelemetrySignal::Missed, 10_000);
        assert_eq!(dynpower.update(&connected(10_000), &mut power), PowerDecision::Hold);
    }

    #[test]
    fn test_signal_consumed_by_tick() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_dec_level().times(1).return_const(());

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-2, 100, 0)), 0);
        dynpower.update(&connected(0), &mut power);
        assert_eq!(dynpower.update(&connected(1), &mut power), PowerDecision::Hold);
    }

    #[test]
    fn test_new_stats_restart_telemetry_clock() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 100, 0)), 4200);
        assert_eq!(dynpower.last_telemetry_ms(), 4200);

        dynpower.telemetry_update(TelemetrySignal::Missed, 5000);
        assert_eq!(dynpower.last_telemetry_ms(), 4200);
    }

    #[test]
    fn test_relative_lq_drop_boosts() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_set_level().with(eq(PowerLevel::Mw250)).times(1).return_const(());

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 80, 0)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::EmergencyBoost);
        // (7 * 100 + 80) / 8 = 97.5
        assert_eq!(dynpower.estimator().current_lq_average(), 97);
    }

    #[test]
    fn test_lq_drop_measured_from_truncated_average() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_set_level().never();

        // Average 99.875 reads as 99
        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 99, 0)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::Hold);
        assert_eq!(dynpower.estimator().current_lq_average(), 99);

        // A drop of 19 stays under the boost threshold
        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 80, 0)), 1);
        assert_eq!(dynpower.update(&connected(1), &mut power), PowerDecision::Hold);
    }

    #[test]
    fn test_average_just_under_floor_blocks_decrease() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw250);
        power.expect_dec_level().never();
        power.expect_set_level().never();

        dynpower.estimator.init(95);
        for t in 0..5 {
            dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-60, 94, 0)), t);
            assert_eq!(dynpower.update(&connected(t), &mut power), PowerDecision::Hold);
        }
        // About 94.51 after five samples
        assert_eq!(dynpower.estimator().current_lq_average(), 94);
        assert_eq!(dynpower.estimator().rssi_sample_count(), 0);
    }

    #[test]
    fn test_critical_lq_boosts() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        dynpower.reset(0);
        let mut power = MockPowerManagement::new();
        power.expect_set_level().with(eq(PowerLevel::Mw250)).times(2).return_const(());

        // Average already at the floor, so only the absolute check fires
        dynpower.estimator.init(50);
        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 50, 0)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::EmergencyBoost);

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 0, 0)), 1);
        assert_eq!(dynpower.update(&connected(1), &mut power), PowerDecision::EmergencyBoost);
    }

    #[test]
    fn test_rssi_mode_weak_signal_increments() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw25);
        power.expect_inc_level().times(1).return_const(());

        for t in 0..4 {
            dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-95, 100, 0)), t);
            assert_eq!(dynpower.update(&connected(t), &mut power), PowerDecision::Hold);
        }
        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-95, 100, 0)), 4);
        assert_eq!(dynpower.update(&connected(4), &mut power), PowerDecision::Increase(1));
        assert_eq!(dynpower.estimator().rssi_sample_count(), 0);
    }

    #[test]
    fn test_rssi_mode_strong_signal_decrements() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw250);
        power.expect_dec_level().times(1).return_const(());

        let mut last = PowerDecision::Hold;
        for t in 0..5 {
            dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-60, 100, 0)), t);
            last = dynpower.update(&connected(t), &mut power);
        }
        assert_eq!(last, PowerDecision::Decrease);
    }

    #[test]
    fn test_rssi_mode_in_window_holds() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Rssi));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw100);

        // Between -90 and -75 dBm nothing changes
        for t in 0..10 {
            dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-82, 100, 0)), t);
            assert_eq!(dynpower.update(&connected(t), &mut power), PowerDecision::Hold);
        }
    }

    #[test]
    fn test_snr_mode_steps_until_threshold() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Snr { up: 5, down: 10 }));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw25);
        power.expect_inc_level().times(2).return_const(());

        // 2 -> 4 -> 6
        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 100, 2)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::Increase(2));
    }

    #[test]
    fn test_snr_mode_stops_at_headroom() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Snr { up: 5, down: 10 }));
        let mut power = MockPowerManagement::new();
        // Three steps below Mw250
        power.expect_current_level().return_const(PowerLevel::Mw25);
        power.expect_inc_level().times(3).return_const(());

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 100, -20)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::Increase(3));
    }

    #[test]
    fn test_snr_mode_decrements_on_good_link() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Snr { up: 5, down: 10 }));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw100);
        power.expect_dec_level().times(1).return_const(());
        power.expect_inc_level().never();

        dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 100, 12)), 0);
        assert_eq!(dynpower.update(&connected(0), &mut power), PowerDecision::Decrease);
    }

    #[test]
    fn test_snr_mode_needs_good_lq_to_decrement() {
        let mut dynpower = DynamicPower::new(config(DynPowerMode::Snr { up: 5, down: 10 }));
        let mut power = MockPowerManagement::new();
        power.expect_current_level().return_const(PowerLevel::Mw100);
        power.expect_dec_level().never();

        dynpower.estimator.init(90);
        for t in 0..3 {
            dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats(-80, 90, 12)), t);
            assert_eq!(dynpower.update(&connected(t), &mut power), PowerDecision::Hold);
        }
        assert!(dynpower.estimator().current_lq_average() < 95);
    }

    #[test]
    fn test_level_stays_within_bounds() {
        let cfg = DynamicPowerConfig {
            target: PowerLevel::Mw500,
            ..config(DynPowerMode::Rssi)
        };
        let mut dynpower = DynamicPower::new(cfg);
        let mut power = PowerManager::new(PowerLevel::Mw25, PowerLevel::Mw500);

        let mut seed: u32 = 0x1234_5678;
        let mut next = move || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            seed >> 8
        };

        for now in 0..5000u32 {
            let r = next();
            let signal = match r % 4 {
                0 => TelemetrySignal::NoUpdate,
                1 => TelemetrySignal::Missed,
                _ => TelemetrySignal::NewLinkStats(stats(
                    -(((r >> 4) % 120) as i8),
                    ((r >> 12) % 101) as u8,
                    ((r >> 20) % 40) as i8 - 20,
                )),
            };
            dynpower.telemetry_update(signal, now * 7);

            let mut channels = HIGH;
            if r % 97 == 0 {
                channels[CRSF_AUX9] = CRSF_CHANNEL_VALUE_MIN;
            }
            let connection = if r % 13 == 0 {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Connected
            };
            let inputs = LinkInputs {
                now_ms: now * 7 + (r % 1000),
                armed: r % 3 != 0,
                connection,
                channels: &channels,
            };
            dynpower.update(&inputs, &mut power);

            let level = power.current_level();
            assert!(level >= PowerLevel::Mw25 && level <= PowerLevel::Mw500, "{} out of bounds", level);
        }
    }

    #[test]
    fn test_air_rate_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            rate: AirRate,
        }

        let w: Wrapper = toml::from_str("rate = \"flrc500hz\"").unwrap();
        assert_eq!(w.rate, AirRate::Flrc500Hz);
        assert!(matches!(w.rate.rf_params().mode, DynPowerMode::Snr { .. }));

        let w: Wrapper = toml::from_str("rate = \"150hz\"").unwrap();
        assert_eq!(w.rate.rf_params().interval_us, 6666);
        assert_eq!(w.rate.to_string(), "150Hz");
    }
}
