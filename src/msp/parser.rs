//! # MSP v2 Stream Parser
//!
//! Reassembles MSP v2 messages from a byte stream and serializes packets
//! back into the same framing.
//!
//! ## Framing
//!
//! | Offset | Field | In CRC |
//! |--------|-------|--------|
//! | 0 | `$` | |
//! | 1 | `X` | |
//! | 2 | `<` command / `>` response | |
//! | 3 | flags (u8) | yes |
//! | 4 | function (u16 LE) | yes |
//! | 6 | payload size (u16 LE) | yes |
//! | 8 | payload | yes |
//! | 8+n | CRC8-DVB-S2 | |
//!
//! Any byte that does not fit the expected header sequence drops the message
//! in progress and the parser waits for the next `$`.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use super::{MspPacket, MspPacketType, MSP_PORT_INBUF_SIZE};
use crate::crsf::crc::{crc8_dvb_s2, crc8_dvb_s2_update};

const MSP_START: u8 = b'$';
const MSP_V2: u8 = b'X';
const MSP_COMMAND: u8 = b'<';
const MSP_RESPONSE: u8 = b'>';

/// flags + function + payload size
const MSP_V2_HEADER_SIZE: usize = 5;

/// Reassembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MspState {
    Idle,
    HeaderStart,
    HeaderX,
    HeaderV2,
    PayloadV2,
    ChecksumV2,
    CommandReceived,
}

/// Byte-at-a-time MSP v2 reassembler
#[derive(Debug, Clone)]
pub struct MspParser {
    state: MspState,
    offset: usize,
    expected_size: usize,
    header: [u8; MSP_V2_HEADER_SIZE],
    packet: MspPacket,
    crc: u8,
}

impl Default for MspParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MspParser {
    pub fn new() -> Self {
        Self {
            state: MspState::Idle,
            offset: 0,
            expected_size: 0,
            header: [0; MSP_V2_HEADER_SIZE],
            packet: MspPacket::new(),
            crc: 0,
        }
    }

    pub fn state(&self) -> MspState {
        self.state
    }

    /// Feed one byte, returning true when a complete packet is ready
    ///
    /// A finished packet stays available until the next byte arrives or
    /// [`mark_packet_received`](Self::mark_packet_received) is called.
    pub fn process_received_byte(&mut self, c: u8) -> bool {
        match self.state {
            MspState::Idle | MspState::CommandReceived => {
                self.state = if c == MSP_START {
                    MspState::HeaderStart
                } else {
                    MspState::Idle
                };
            }
            MspState::HeaderStart => {
                self.state = if c == MSP_V2 {
                    MspState::HeaderX
                } else {
                    MspState::Idle
                };
            }
            MspState::HeaderX => {
                self.packet.reset();
                self.offset = 0;
                self.crc = 0;

                match c {
                    MSP_COMMAND => {
                        self.packet.make_command();
                        self.state = MspState::HeaderV2;
                    }
                    MSP_RESPONSE => {
                        self.packet.make_response();
                        self.state = MspState::HeaderV2;
                    }
                    _ => self.state = MspState::Idle,
                }
            }
            MspState::HeaderV2 => {
                self.header[self.offset] = c;
                self.offset += 1;
                self.crc = crc8_dvb_s2_update(self.crc, c);

                if self.offset == MSP_V2_HEADER_SIZE {
                    self.packet.flags = self.header[0];
                    self.packet.function = u16::from_le_bytes([self.header[1], self.header[2]]);
                    self.expected_size = u16::from_le_bytes([self.header[3], self.header[4]]) as usize;
                    self.offset = 0;

                    self.state = if self.expected_size > MSP_PORT_INBUF_SIZE {
                        debug!("Dropping MSP packet with {} byte payload", self.expected_size);
                        MspState::Idle
                    } else if self.expected_size == 0 {
                        MspState::ChecksumV2
                    } else {
                        MspState::PayloadV2
                    };
                }
            }
            MspState::PayloadV2 => {
                self.packet.add_byte(c);
                self.offset += 1;
                self.crc = crc8_dvb_s2_update(self.crc, c);

                if self.offset == self.expected_size {
                    self.state = MspState::ChecksumV2;
                }
            }
            MspState::ChecksumV2 => {
                if self.crc == c {
                    self.state = MspState::CommandReceived;
                } else {
                    warn!("CRC failure on MSP packet - got 0x{:02X} expected 0x{:02X}", c, self.crc);
                    self.state = MspState::Idle;
                }
            }
        }

        self.state == MspState::CommandReceived
    }

    /// The completed packet, if one is waiting
    pub fn received_packet(&self) -> Option<&MspPacket> {
        (self.state == MspState::CommandReceived).then_some(&self.packet)
    }

    /// Release a completed packet and go back to waiting for `$`
    pub fn mark_packet_received(&mut self) {
        self.state = MspState::Idle;
    }

    /// Serialize a packet into MSP v2 framing
    ///
    /// Returns `None` for packets that are neither command nor response.
    ///
    /// # Examples
    ///
    /// ```
    /// use elrs_link::msp::MspPacket;
    /// use elrs_link::msp::parser::MspParser;
    ///
    /// let frame = MspParser::serialize(&MspPacket::command(5, &[1, 2])).unwrap();
    /// let mut parser = MspParser::new();
    /// let done = frame.iter().fold(false, |_, &b| parser.process_received_byte(b));
    /// assert!(done);
    /// ```
    pub fn serialize(packet: &MspPacket) -> Option<Bytes> {
        let direction = match packet.packet_type {
            MspPacketType::Command => MSP_COMMAND,
            MspPacketType::Response => MSP_RESPONSE,
            MspPacketType::Unknown => return None,
        };

        let payload = packet.payload();
        let mut buf = BytesMut::with_capacity(3 + MSP_V2_HEADER_SIZE + payload.len() + 1);
        buf.put_u8(MSP_START);
        buf.put_u8(MSP_V2);
        buf.put_u8(direction);
        buf.put_u8(packet.flags);
        buf.put_u16_le(packet.function);
        buf.put_u16_le(payload.len() as u16);
        buf.put_slice(payload);

        let crc = crc8_dvb_s2(&buf[3..]);
        buf.put_u8(crc);

        Some(buf.freeze())
    }
}
