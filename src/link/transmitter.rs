//! Transmitter side of the link.

use tracing::{debug, info};

use super::CONNECTION_TIMEOUT_MS;
use crate::crsf::convert::crsf_to_bit;
use crate::crsf::protocol::{LinkStatistics, CRSF_AUX1};
use crate::msp::MspPacket;
use crate::ota::channels::{ChannelFrame, SwitchState};
use crate::ota::link_stats::unpack_link_stats_frame;
use crate::ota::msp::pack_msp_frame;
use crate::ota::packer::ChannelPacker;
use crate::ota::OtaFrame;
use crate::power::dynamic::ConnectionState;
use crate::power::{
    DynamicPower, DynamicPowerConfig, LinkInputs, PowerDecision, PowerLevel, PowerManagement, PowerManager,
    TelemetrySignal,
};
use crate::radio::RadioDriver;

/// Transmitter state for one link
#[derive(Debug)]
pub struct Transmitter<P: ChannelPacker> {
    packer: P,
    switches: SwitchState,
    channels: ChannelFrame,
    msp_pending: Option<MspPacket>,
    dynpower: DynamicPower,
    power: PowerManager,
    connection: ConnectionState,
    telemetry_status: bool,
}

impl<P: ChannelPacker> Transmitter<P> {
    /// Create a transmitter starting at the configured power
    ///
    /// `floor` bounds automatic decreases; the configured target is the
    /// ceiling.
    pub fn new(packer: P, config: DynamicPowerConfig, floor: PowerLevel) -> Self {
        info!(
            "Transmitter: {} switches, {}, dynamic power {}, boost channel {}",
            P::NAME,
            config.target,
            if config.enabled { "on" } else { "off" },
            config.boost_channel
        );

        Self {
            packer,
            switches: SwitchState::new(),
            channels: ChannelFrame::default(),
            msp_pending: None,
            dynpower: DynamicPower::new(config),
            power: PowerManager::new(floor, config.target),
            connection: ConnectionState::Disconnected,
            telemetry_status: false,
        }
    }

    /// Restart telemetry timing at `now_ms`
    pub fn start(&mut self, now_ms: u32) {
        self.dynpower.reset(now_ms);
    }

    /// Queue an MSP command for the next frame
    ///
    /// Returns false if a command is already waiting.
    pub fn queue_msp(&mut self, packet: MspPacket) -> bool {
        if self.msp_pending.is_some() {
            debug!("MSP slot busy, dropping 0x{:02X}", packet.function);
            return false;
        }
        self.msp_pending = Some(packet);
        true
    }

    /// Build the next frame from `frame`
    ///
    /// A queued MSP command takes the slot; one that does not fit is
    /// dropped and channel data goes out instead.
    pub fn next_frame(&mut self, frame: &ChannelFrame) -> OtaFrame {
        self.channels = *frame;
        self.switches.update_from_channels(frame);

        if let Some(mut packet) = self.msp_pending.take() {
            if let Ok(buffer) = pack_msp_frame(&mut packet) {
                return buffer;
            }
        }

        self.packer.pack(frame, &mut self.switches, self.telemetry_status)
    }

    /// Apply the current power and send the next frame
    pub fn send<R: RadioDriver>(&mut self, radio: &mut R, frame: &ChannelFrame) {
        radio.set_power(self.power.current_level());
        let buffer = self.next_frame(frame);
        radio.transmit(&buffer);
    }

    /// Handle the downlink slot: link statistics, or a miss if none arrived
    ///
    /// Returns the statistics received, if any.
    pub fn on_telemetry_slot<R: RadioDriver>(&mut self, radio: &mut R, now_ms: u32) -> Option<LinkStatistics> {
        let stats = radio.receive().and_then(|frame| unpack_link_stats_frame(&frame));

        match stats {
            Some(stats) => {
                if self.connection == ConnectionState::Disconnected {
                    info!("Link connected ({} dBm, LQ {})", stats.active_rssi_dbm(), stats.uplink_lq);
                }
                self.connection = ConnectionState::Connected;
                self.telemetry_status = true;
                self.dynpower.telemetry_update(TelemetrySignal::NewLinkStats(stats), now_ms);
                Some(stats)
            }
            None => {
                self.telemetry_status = false;
                self.dynpower.telemetry_update(TelemetrySignal::Missed, now_ms);

                let silent_ms = now_ms.wrapping_sub(self.dynpower.last_telemetry_ms());
                if self.connection == ConnectionState::Connected && silent_ms > CONNECTION_TIMEOUT_MS {
                    info!("Link lost after {} ms without telemetry", silent_ms);
                    self.connection = ConnectionState::Disconnected;
                }
                None
            }
        }
    }

    /// Run the power controller for this tick
    pub fn tick(&mut self, now_ms: u32) -> PowerDecision {
        let inputs = LinkInputs {
            now_ms,
            armed: self.is_armed(),
            connection: self.connection,
            channels: &self.channels.channels,
        };
        self.dynpower.update(&inputs, &mut self.power)
    }

    /// Armed when AUX1 is high
    pub fn is_armed(&self) -> bool {
        crsf_to_bit(self.channels.channels[CRSF_AUX1]) == 1
    }

    pub fn power_level(&self) -> PowerLevel {
        self.power.current_level()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn dynamic_power(&self) -> &DynamicPower {
        &self.dynpower
    }
}
