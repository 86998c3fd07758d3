//! # Link Simulator
//!
//! Runs a transmitter and receiver against simulated radio paths on the
//! host, one tick per air-rate packet interval.
//!
//! Each tick:
//! 1. Move the receiver along the configured distance ramp
//! 2. Sample synthetic sticks and switches (armed after a delay)
//! 3. Queue an MSP command when one is due
//! 4. Send the uplink frame; the receiver decodes it
//! 5. Every `telemetry_ratio` ticks, report link statistics on the downlink
//! 6. Run the dynamic power controller
//!
//! [`Simulation::step`] is synchronous and deterministic; [`Simulation::run`]
//! paces it in real time until the duration ends or Ctrl+C.

use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::config::Config;
use crate::crsf::convert::{bit_to_crsf, n_to_crsf};
use crate::crsf::protocol::{LinkStatistics, CRSF_AUX1, CRSF_CHANNEL_VALUE_MAX};
use crate::error::Result;
use crate::link::{Receiver, RxEvent, Transmitter};
use crate::msp::parser::MspParser;
use crate::msp::MspPacket;
use crate::ota::channels::{ChannelFrame, N_SWITCHES, SWITCH1_POSITIONS, SWITCH_POSITIONS};
use crate::ota::fixed::FixedSwitches;
use crate::ota::hybrid::HybridSwitches;
use crate::ota::packer::{ChannelPacker, SwitchMode};
use crate::power::{PowerDecision, PowerLevel};
use crate::radio::{RadioDriver, SimulatedRadio};
use crate::telemetry::{TelemetryLogger, TelemetryRecord};

/// Receiver transmit power on the downlink
const DOWNLINK_POWER: PowerLevel = PowerLevel::Mw100;

/// MSP function used for simulated configuration traffic
const MSP_SET_VTX_CONFIG: u16 = 0x59;

/// VTX band and channel sent after the sequence number
const VTX_BAND_CHANNEL: [u8; 2] = [5, 1];

/// Ticks between status log lines
const LOG_INTERVAL_TICKS: u64 = 1000;

/// Counters for a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSummary {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub telemetry_received: u64,
    pub telemetry_missed: u64,
    pub msp_sent: u64,
    pub msp_delivered: u64,
    pub min_power: PowerLevel,
    pub max_power: PowerLevel,
    pub final_power: PowerLevel,
}

impl SimSummary {
    fn new(initial: PowerLevel) -> Self {
        Self {
            packets_sent: 0,
            packets_received: 0,
            telemetry_received: 0,
            telemetry_missed: 0,
            msp_sent: 0,
            msp_delivered: 0,
            min_power: initial,
            max_power: initial,
            final_power: initial,
        }
    }

    fn record_power(&mut self, level: PowerLevel) {
        self.min_power = self.min_power.min(level);
        self.max_power = self.max_power.max(level);
        self.final_power = level;
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub now_ms: u32,
    pub distance_m: f32,
    pub power: PowerLevel,
    pub decision: PowerDecision,
    /// Link statistics the transmitter received this tick
    pub telemetry: Option<LinkStatistics>,
}

/// Host-side link simulation
pub struct Simulation<P: ChannelPacker> {
    config: Config,
    interval_us: u32,
    tx: Transmitter<P>,
    rx: Receiver<P>,
    uplink: SimulatedRadio,
    downlink: SimulatedRadio,
    flight_controller: MspParser,
    logger: Option<TelemetryLogger>,
    tick: u64,
    next_msp_ms: u32,
    msp_seq: u16,
    summary: SimSummary,
}

impl<P: ChannelPacker + Clone> Simulation<P> {
    /// Build a simulation from validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the telemetry log
    /// directory cannot be created
    pub fn new(config: Config, packer: P) -> Result<Self> {
        config.validate()?;

        let dyn_config = config.dynamic_power_config()?;
        let floor = config.power.min_level()?;
        let sensitivity = dyn_config.rf.sensitivity_dbm;
        let start = config.simulation.start_distance_m;

        let mut tx = Transmitter::new(packer.clone(), dyn_config, floor);
        tx.start(0);

        let logger = if config.telemetry.enabled {
            Some(TelemetryLogger::new(
                &config.telemetry.log_dir,
                "telemetry",
                config.telemetry.max_records_per_file,
                config.telemetry.max_files_to_keep,
            )?)
        } else {
            None
        };

        Ok(Self {
            interval_us: dyn_config.rf.interval_us,
            tx,
            rx: Receiver::new(packer),
            uplink: SimulatedRadio::new(dyn_config.target, sensitivity, start),
            downlink: SimulatedRadio::new(DOWNLINK_POWER, sensitivity, start),
            flight_controller: MspParser::new(),
            logger,
            tick: 0,
            next_msp_ms: config.simulation.armed_after_ms,
            msp_seq: 0,
            summary: SimSummary::new(dyn_config.target),
            config,
        })
    }

    /// Link time of the next tick
    pub fn now_ms(&self) -> u32 {
        (self.tick * self.interval_us as u64 / 1000) as u32
    }

    pub fn is_finished(&self) -> bool {
        self.now_ms() as u64 >= self.config.simulation.duration_s * 1000
    }

    pub fn summary(&self) -> &SimSummary {
        &self.summary
    }

    pub fn transmitter(&self) -> &Transmitter<P> {
        &self.tx
    }

    /// Receiver distance at `now_ms`, interpolated over the run
    pub fn distance_at(&self, now_ms: u32) -> f32 {
        let sim = &self.config.simulation;
        let progress = (now_ms as f32 / (sim.duration_s as f32 * 1000.0)).clamp(0.0, 1.0);
        sim.start_distance_m + (sim.end_distance_m - sim.start_distance_m) * progress
    }

    /// Advance the link by one packet interval
    pub fn step(&mut self) -> Result<StepReport> {
        let now_ms = self.now_ms();
        let distance_m = self.distance_at(now_ms);
        self.uplink.set_distance(distance_m);
        self.downlink.set_distance(distance_m);

        let armed = now_ms >= self.config.simulation.armed_after_ms;
        let frame = synthetic_channels(now_ms, armed);

        let msp_interval = self.config.simulation.msp_interval_ms;
        if msp_interval > 0 && now_ms >= self.next_msp_ms {
            self.next_msp_ms = now_ms.saturating_add(msp_interval);
            let seq = self.msp_seq.wrapping_add(1);
            let [lo, hi] = seq.to_le_bytes();
            let packet = MspPacket::command(MSP_SET_VTX_CONFIG, &[lo, hi, VTX_BAND_CHANNEL[0], VTX_BAND_CHANNEL[1]]);
            if self.tx.queue_msp(packet) {
                self.msp_seq = seq;
                self.summary.msp_sent += 1;
            }
        }

        self.tx.send(&mut self.uplink, &frame);
        self.summary.packets_sent += 1;

        if let Some(event) = self.rx.poll(&mut self.uplink) {
            self.summary.packets_received += 1;
            if let RxEvent::Msp(bytes) = event {
                for &b in bytes.iter() {
                    if self.flight_controller.process_received_byte(b) {
                        if self.flight_controller.received_packet().is_some_and(|p| self.is_current_msp(p)) {
                            self.summary.msp_delivered += 1;
                        }
                        self.flight_controller.mark_packet_received();
                    }
                }
            }
        }

        let ratio = self.config.link.telemetry_ratio as u64;
        let mut telemetry = None;
        if self.tick % ratio == ratio - 1 {
            // The receiver stays silent once it hears nothing
            let stats = self.uplink.link_statistics();
            if stats.uplink_lq > 0 {
                self.rx.send_link_stats(&mut self.downlink, &stats);
            }

            telemetry = self.tx.on_telemetry_slot(&mut self.downlink, now_ms);
            if telemetry.is_some() {
                self.summary.telemetry_received += 1;
            } else {
                self.summary.telemetry_missed += 1;
            }
        }

        let decision = self.tx.tick(now_ms);
        let power = self.tx.power_level();
        self.summary.record_power(power);
        if decision != PowerDecision::Hold {
            debug!("{} ms: {:?} -> {}", now_ms, decision, power);
        }

        if let (Some(logger), Some(stats)) = (self.logger.as_mut(), telemetry.as_ref()) {
            let record = TelemetryRecord::now(
                now_ms,
                distance_m,
                power.milliwatts(),
                stats.active_rssi_dbm(),
                stats.uplink_lq,
                stats.uplink_snr,
                self.tx.dynamic_power().estimator().current_lq_average(),
                decision,
            );
            logger.log(&record)?;
        }

        self.tick += 1;

        Ok(StepReport {
            now_ms,
            distance_m,
            power,
            decision,
            telemetry,
        })
    }

    /// The flight controller got the latest VTX command intact
    fn is_current_msp(&self, packet: &MspPacket) -> bool {
        let mut packet = packet.clone();
        let seq = packet.read_u16_le();
        packet.function == MSP_SET_VTX_CONFIG && !packet.has_read_error() && seq == self.msp_seq
    }

    /// Run in real time until the configured duration ends or Ctrl+C
    pub async fn run(mut self) -> Result<SimSummary> {
        info!(
            "Starting link simulation: {} ({} switches), {} s, {:.0} m -> {:.0} m",
            self.config.link.air_rate,
            P::NAME,
            self.config.simulation.duration_s,
            self.config.simulation.start_distance_m,
            self.config.simulation.end_distance_m
        );

        let mut ticker = interval(Duration::from_micros(self.interval_us as u64));

        while !self.is_finished() {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.step()?;

                    if self.tick % LOG_INTERVAL_TICKS == 0 {
                        info!(
                            "{} ms: {:.0} m, {}, LQ avg {}",
                            report.now_ms,
                            report.distance_m,
                            report.power,
                            self.tx.dynamic_power().estimator().current_lq_average()
                        );
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                    break;
                }
            }
        }

        if let Some(logger) = self.logger.as_mut() {
            logger.flush()?;
        }

        let summary = self.summary.clone();
        info!(
            "Sent {} packets, {} received, telemetry {}/{}, MSP {}/{}, power {}..{} (final {})",
            summary.packets_sent,
            summary.packets_received,
            summary.telemetry_received,
            summary.telemetry_received + summary.telemetry_missed,
            summary.msp_delivered,
            summary.msp_sent,
            summary.min_power,
            summary.max_power,
            summary.final_power
        );
        Ok(summary)
    }
}

/// Run the simulation with the switch layout named in `config`
pub async fn run_configured(config: Config) -> Result<SimSummary> {
    match config.link.switch_mode {
        SwitchMode::Hybrid => Simulation::new(config, HybridSwitches)?.run().await,
        SwitchMode::Fixed => Simulation::new(config, FixedSwitches)?.run().await,
    }
}

/// Stick and switch pattern at `now_ms`
///
/// Sticks sweep on triangle waves of different periods; switches step
/// through their positions at different rates.
pub fn synthetic_channels(now_ms: u32, armed: bool) -> ChannelFrame {
    let mut frame = ChannelFrame::default();

    for (ch, period_ms) in [2000u32, 3000, 5000, 7000].into_iter().enumerate() {
        frame.channels[ch] = triangle(now_ms, period_ms);
    }

    frame.channels[CRSF_AUX1] = bit_to_crsf(armed as u8);
    let aux2 = (now_ms / 250) % SWITCH1_POSITIONS as u32;
    frame.channels[CRSF_AUX1 + 1] = n_to_crsf(aux2 as u16, SWITCH1_POSITIONS - 1);
    for i in 2..N_SWITCHES {
        let position = (now_ms / (700 * i as u32)) % SWITCH_POSITIONS as u32;
        frame.channels[CRSF_AUX1 + i] = n_to_crsf(position as u16, SWITCH_POSITIONS - 1);
    }

    frame
}

fn triangle(now_ms: u32, period_ms: u32) -> u16 {
    let half = period_ms / 2;
    let phase = now_ms % period_ms;
    let rising = if phase < half { phase } else { period_ms - phase };
    (rising as u64 * CRSF_CHANNEL_VALUE_MAX as u64 / half as u64) as u16
}
