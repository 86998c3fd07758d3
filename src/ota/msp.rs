//! # MSP Over The Air
//!
//! Carries a small MSP command in an OTA frame:
//!
//! ```text
//! [type=MSP_DATA] [function] [payload size] [p0] [p1] [p2] [p3]
//! ```
//!
//! Only payloads of up to 4 bytes fit. The receiver always copies all four
//! payload slots; the size byte is informational for whoever reassembles
//! longer exchanges.

use tracing::warn;

use super::{OtaFrame, PacketHeaderType, OTA_FRAME_SIZE};
use crate::error::{LinkError, Result};
use crate::msp::MspPacket;

/// Payload bytes available in one OTA frame
pub const MSP_OTA_PAYLOAD_SIZE: usize = 4;

/// Offset of the first payload byte
const MSP_OTA_PAYLOAD_OFFSET: usize = 3;

/// Build an MSP_DATA frame from `packet`
///
/// Reads the payload from the start, leaving the packet's cursor at the end.
///
/// # Errors
///
/// Returns [`LinkError::MspPayloadTooLarge`] when the payload exceeds
/// [`MSP_OTA_PAYLOAD_SIZE`], or [`LinkError::MspFunctionTooLarge`] when the
/// function id needs more than the one byte the frame carries. Nothing
/// should be transmitted in either case.
///
/// # Examples
///
/// ```
/// use elrs_link::msp::MspPacket;
/// use elrs_link::ota::msp::pack_msp_frame;
///
/// let mut packet = MspPacket::command(0x07, &[3]);
/// let frame = pack_msp_frame(&mut packet)?;
/// assert_eq!(frame, [0x01, 0x07, 0x01, 0x03, 0x00, 0x00, 0x00]);
/// # Ok::<(), elrs_link::error::LinkError>(())
/// ```
pub fn pack_msp_frame(packet: &mut MspPacket) -> Result<OtaFrame> {
    let size = packet.payload_size();
    if size > MSP_OTA_PAYLOAD_SIZE {
        warn!("Unable to send MSP command 0x{:02X}. Packet too long ({} bytes).", packet.function, size);
        return Err(LinkError::MspPayloadTooLarge {
            size,
            max: MSP_OTA_PAYLOAD_SIZE,
        });
    }

    let Ok(function) = u8::try_from(packet.function) else {
        warn!("Unable to send MSP command 0x{:04X}. Function id does not fit the frame.", packet.function);
        return Err(LinkError::MspFunctionTooLarge {
            function: packet.function,
        });
    };

    let mut buffer = [0u8; OTA_FRAME_SIZE];
    buffer[0] = PacketHeaderType::MspData as u8;
    buffer[1] = function;
    buffer[2] = size as u8;

    packet.rewind();
    for slot in &mut buffer[MSP_OTA_PAYLOAD_OFFSET..MSP_OTA_PAYLOAD_OFFSET + size] {
        *slot = packet.read_byte();
    }

    Ok(buffer)
}

/// Decode an MSP_DATA frame into `packet` as a command
pub fn unpack_msp_frame(buffer: &OtaFrame, packet: &mut MspPacket) {
    packet.reset();
    packet.make_command();
    packet.flags = 0;
    packet.function = buffer[1] as u16;
    for &b in &buffer[MSP_OTA_PAYLOAD_OFFSET..] {
        packet.add_byte(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msp::MspPacketType;
    use crate::ota::frame_type;

    #[test]
    fn test_unpack_fixed_positions() {
        let buffer = [0x01, 5, 0xEE, 0x11, 0x22, 0x33, 0x44];
        let mut packet = MspPacket::command(99, &[1, 2, 3, 4, 5, 6]);

        unpack_msp_frame(&buffer, &mut packet);

        assert_eq!(packet.packet_type, MspPacketType::Command);
        assert_eq!(packet.function, 5);
        assert_eq!(packet.flags, 0);
        assert_eq!(packet.payload(), &[0x11, 0x22, 0x33, 0x44]);
        assert!(!packet.has_read_error());
    }

    #[test]
    fn test_pack_zero_fills_unused_payload() {
        let mut packet = MspPacket::command(0x0B, &[0x10, 0x20]);
        let buffer = pack_msp_frame(&mut packet).unwrap();

        assert_eq!(frame_type(&buffer), PacketHeaderType::MspData);
        assert_eq!(buffer, [0x01, 0x0B, 2, 0x10, 0x20, 0, 0]);
        assert!(!packet.has_read_error());
    }

    #[test]
    fn test_pack_full_payload() {
        let mut packet = MspPacket::command(0x0A, &[1, 2, 3, 4]);
        let buffer = pack_msp_frame(&mut packet).unwrap();
        assert_eq!(&buffer[3..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_pack_rejects_oversized_payload() {
        let mut packet = MspPacket::command(0x21, &[1, 2, 3, 4, 5]);
        let result = pack_msp_frame(&mut packet);

        match result {
            Err(LinkError::MspPayloadTooLarge { size, max }) => {
                assert_eq!(size, 5);
                assert_eq!(max, 4);
            }
            other => panic!("Expected MspPayloadTooLarge, got: {:?}", other),
        }
    }

    #[test]
    fn test_pack_rejects_wide_function_id() {
        let mut packet = MspPacket::command(0x1F01, &[1]);
        let result = pack_msp_frame(&mut packet);

        match result {
            Err(LinkError::MspFunctionTooLarge { function }) => assert_eq!(function, 0x1F01),
            other => panic!("Expected MspFunctionTooLarge, got: {:?}", other),
        }

        let mut packet = MspPacket::command(0xFF, &[1]);
        assert_eq!(pack_msp_frame(&mut packet).unwrap()[1], 0xFF);
    }

    #[test]
    fn test_pack_then_unpack() {
        let mut sent = MspPacket::command(0x08, &[0x7F, 0x80, 0x81]);
        let buffer = pack_msp_frame(&mut sent).unwrap();

        let mut received = MspPacket::new();
        unpack_msp_frame(&buffer, &mut received);

        assert_eq!(received.function, 0x08);
        // All four slots come across; the unused one is zero
        assert_eq!(received.payload(), &[0x7F, 0x80, 0x81, 0x00]);
    }
}
