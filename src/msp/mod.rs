//! # MSP Module
//!
//! MultiWii Serial Protocol messages used for auxiliary configuration
//! exchange over the link.
//!
//! This module handles:
//! - The shared [`MspPacket`] buffer (fixed 8-byte payload, read cursor)
//! - MSP v2 stream reassembly and serialization ([`parser`])
//!
//! Reading past the end of a payload never panics. It sets a sticky
//! `read_error` flag and returns zero until the packet is reset, so callers
//! check [`MspPacket::has_read_error`] before trusting decoded fields.

pub mod parser;

/// Payload capacity of a packet
///
/// The link only ever carries small configuration commands.
pub const MSP_PORT_INBUF_SIZE: usize = 8;

/// Direction of an MSP message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MspPacketType {
    #[default]
    Unknown,
    Command,
    Response,
}

/// One MSP message with a bounded payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MspPacket {
    /// Command or response
    pub packet_type: MspPacketType,

    /// MSP v2 flags byte
    pub flags: u8,

    /// Function id
    pub function: u16,

    payload: [u8; MSP_PORT_INBUF_SIZE],
    payload_size: usize,
    read_cursor: usize,
    read_error: bool,
}

impl MspPacket {
    /// Create an empty packet
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a command packet
    ///
    /// Bytes beyond [`MSP_PORT_INBUF_SIZE`] are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use elrs_link::msp::MspPacket;
    ///
    /// let packet = MspPacket::command(0x07, &[3]);
    /// assert_eq!(packet.payload(), &[3]);
    /// ```
    pub fn command(function: u16, payload: &[u8]) -> Self {
        let mut packet = Self::new();
        packet.make_command();
        packet.function = function;
        for &b in payload {
            packet.add_byte(b);
        }
        packet
    }

    /// Clear everything, including the read error
    pub fn reset(&mut self) {
        self.packet_type = MspPacketType::Unknown;
        self.flags = 0;
        self.function = 0;
        self.payload_size = 0;
        self.read_cursor = 0;
        self.read_error = false;
    }

    pub fn make_command(&mut self) {
        self.packet_type = MspPacketType::Command;
    }

    pub fn make_response(&mut self) {
        self.packet_type = MspPacketType::Response;
    }

    /// Append a payload byte, returning false when the buffer is full
    pub fn add_byte(&mut self, b: u8) -> bool {
        if self.payload_size >= MSP_PORT_INBUF_SIZE {
            return false;
        }
        self.payload[self.payload_size] = b;
        self.payload_size += 1;
        true
    }

    /// Read the next payload byte
    ///
    /// Past the end of the payload this sets the read error and returns 0.
    /// Once set, every read returns 0 until [`reset`](Self::reset).
    pub fn read_byte(&mut self) -> u8 {
        if self.read_error || self.read_cursor >= self.payload_size {
            self.read_error = true;
            return 0;
        }

        let b = self.payload[self.read_cursor];
        self.read_cursor += 1;
        b
    }

    /// Read a little-endian u16 from the payload
    pub fn read_u16_le(&mut self) -> u16 {
        let lo = self.read_byte();
        let hi = self.read_byte();
        u16::from_le_bytes([lo, hi])
    }

    /// Move the read cursor back to the start of the payload
    pub fn rewind(&mut self) {
        self.read_cursor = 0;
    }

    pub fn has_read_error(&self) -> bool {
        self.read_error
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_size]
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_constructor() {
        let packet = MspPacket::command(0x4578, &[1, 2, 3]);
        assert_eq!(packet.packet_type, MspPacketType::Command);
        assert_eq!(packet.function, 0x4578);
        assert_eq!(packet.payload(), &[1, 2, 3]);
    }

    #[test]
    fn test_add_byte_bounded() {
        let mut packet = MspPacket::new();
        for i in 0..MSP_PORT_INBUF_SIZE {
            assert!(packet.add_byte(i as u8));
        }
        assert!(!packet.add_byte(0xFF));
        assert_eq!(packet.payload_size(), MSP_PORT_INBUF_SIZE);
    }

    #[test]
    fn test_read_bytes_in_order() {
        let mut packet = MspPacket::command(1, &[0x34, 0x12, 0x56]);
        assert_eq!(packet.read_u16_le(), 0x1234);
        assert_eq!(packet.read_byte(), 0x56);
        assert!(!packet.has_read_error());
    }

    #[test]
    fn test_read_past_end_is_sticky() {
        let mut packet = MspPacket::command(1, &[0xAA]);
        assert_eq!(packet.read_byte(), 0xAA);
        assert_eq!(packet.read_byte(), 0);
        assert!(packet.has_read_error());

        // Adding data and rewinding does not clear the flag
        packet.add_byte(0xBB);
        packet.rewind();
        assert_eq!(packet.read_byte(), 0);
        assert!(packet.has_read_error());

        packet.reset();
        assert!(!packet.has_read_error());
        assert_eq!(packet.payload_size(), 0);
        assert_eq!(packet.packet_type, MspPacketType::Unknown);
    }

    #[test]
    fn test_rewind_rereads_payload() {
        let mut packet = MspPacket::command(1, &[9, 8]);
        packet.read_byte();
        packet.read_byte();
        packet.rewind();
        assert_eq!(packet.read_byte(), 9);
    }
}
