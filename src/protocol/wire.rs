//! Wire format encoding and decoding.
//!
//! Frame layout (all multi-byte integers little-endian):
//!
//! ```text
//! ┌────────────┬────────────┬──────────────┬──────────────────┐
//! │ Kind (1B)  │ Flags (1B) │ Frame id     │ Payload          │
//! │ 0..=3      │ must be 0  │ (16B)        │ type-specific    │
//! └────────────┴────────────┴──────────────┴──────────────────┘
//! ```
//!
//! Payload layouts:
//!
//! - Control: 1 byte op, then op-dependent data (handshake payload,
//!   nothing for ping/pong, optional UTF-8 reason for close).
//! - Message: u32 LE subject length + subject bytes + remaining data.
//! - Ack: exactly 16 bytes, the acknowledged frame's identifier.
//! - Error: u16 LE code + u32 LE message length + message bytes +
//!   optional remaining details.
//!
//! Every length read from the wire is bounds-checked against the
//! remaining buffer before slicing. Decoded payloads are copied out of
//! the input buffer, never borrowed from it.

use bytes::{BufMut, Bytes, BytesMut};

use super::frame::{ControlFrame, Frame, FrameBody};
use super::frame_id::{FrameId, FRAME_ID_LEN};
use super::subject::Subject;
use crate::error::{Result, SidebandError};

/// Fixed header size: kind + flags + frame id.
pub const HEADER_SIZE: usize = 2 + FRAME_ID_LEN;

/// Maximum size of a complete encoded frame: 1 MiB.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum size of a handshake payload: 8 KiB.
pub const MAX_HANDSHAKE_PAYLOAD: usize = 8 * 1024;

/// Cap on error frame details: 16 KiB.
pub const MAX_ERROR_DETAILS: usize = 16 * 1024;

/// Frame kind discriminants.
pub mod kind {
    /// Control frame (handshake, ping, pong, close).
    pub const CONTROL: u8 = 0;
    /// Message frame (subject + data).
    pub const MESSAGE: u8 = 1;
    /// Ack frame (receipt of one prior frame).
    pub const ACK: u8 = 2;
    /// Error frame (code + message + details).
    pub const ERROR: u8 = 3;
}

/// Control operation codes.
pub mod op {
    /// Handshake; data required.
    pub const HANDSHAKE: u8 = 0;
    /// Ping; data forbidden.
    pub const PING: u8 = 1;
    /// Pong; data forbidden.
    pub const PONG: u8 = 2;
    /// Close; data optional.
    pub const CLOSE: u8 = 3;
}

/// Encode a frame into its wire form.
///
/// Re-enforces every per-variant invariant before writing: handshake
/// data present, non-empty and within the 8 KiB cap; subject
/// revalidated; error details within the 16 KiB cap; total size within
/// the 1 MiB frame cap.
///
/// # Errors
///
/// Returns `InvalidFrame` for variant-contract violations and
/// `ProtocolViolation` for an invalid subject or an oversize frame.
pub fn encode_frame(frame: &Frame) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + 64);

    match &frame.body {
        FrameBody::Control(control) => {
            buf.put_u8(kind::CONTROL);
            buf.put_u8(0);
            buf.put_slice(frame.id.as_bytes());
            match control {
                ControlFrame::Handshake { payload } => {
                    if payload.is_empty() {
                        return Err(SidebandError::InvalidFrame(
                            "handshake data must be non-empty".to_string(),
                        ));
                    }
                    if payload.len() > MAX_HANDSHAKE_PAYLOAD {
                        return Err(SidebandError::ProtocolViolation(format!(
                            "handshake payload is {} bytes (max {})",
                            payload.len(),
                            MAX_HANDSHAKE_PAYLOAD
                        )));
                    }
                    buf.put_u8(op::HANDSHAKE);
                    buf.put_slice(payload);
                }
                ControlFrame::Ping => buf.put_u8(op::PING),
                ControlFrame::Pong => buf.put_u8(op::PONG),
                ControlFrame::Close { reason } => {
                    buf.put_u8(op::CLOSE);
                    if let Some(reason) = reason {
                        buf.put_slice(reason.as_bytes());
                    }
                }
            }
        }
        FrameBody::Message { subject, data } => {
            // Revalidate: a Subject is constructed validated, but the
            // codec is the enforcement point of record.
            let subject = Subject::validate(subject.as_str())?;
            buf.put_u8(kind::MESSAGE);
            buf.put_u8(0);
            buf.put_slice(frame.id.as_bytes());
            buf.put_u32_le(subject.as_bytes().len() as u32);
            buf.put_slice(subject.as_bytes());
            buf.put_slice(data);
        }
        FrameBody::Ack { ack_id } => {
            buf.put_u8(kind::ACK);
            buf.put_u8(0);
            buf.put_slice(frame.id.as_bytes());
            buf.put_slice(ack_id.as_bytes());
        }
        FrameBody::Error {
            code,
            message,
            details,
        } => {
            if let Some(details) = details {
                if details.len() > MAX_ERROR_DETAILS {
                    return Err(SidebandError::ProtocolViolation(format!(
                        "error details are {} bytes (max {})",
                        details.len(),
                        MAX_ERROR_DETAILS
                    )));
                }
            }
            buf.put_u8(kind::ERROR);
            buf.put_u8(0);
            buf.put_slice(frame.id.as_bytes());
            buf.put_u16_le(*code);
            buf.put_u32_le(message.len() as u32);
            buf.put_slice(message.as_bytes());
            if let Some(details) = details {
                buf.put_slice(details);
            }
        }
    }

    if buf.len() > MAX_FRAME_SIZE {
        return Err(SidebandError::ProtocolViolation(format!(
            "encoded frame is {} bytes (max {})",
            buf.len(),
            MAX_FRAME_SIZE
        )));
    }

    Ok(buf.freeze())
}

/// Decode one wire frame from a complete datagram.
///
/// The transport must preserve datagram boundaries: `buf` is exactly one
/// encoded frame. The returned frame owns copies of all payload bytes;
/// it does not borrow from `buf`.
///
/// # Errors
///
/// `InvalidFrame` for any structural fault (truncation, reserved flags,
/// unknown kinds or ops, inconsistent lengths, bad UTF-8) and
/// `ProtocolViolation` for an invalid message subject or oversize frame.
pub fn decode_frame(buf: &[u8]) -> Result<Frame> {
    if buf.len() > MAX_FRAME_SIZE {
        return Err(SidebandError::ProtocolViolation(format!(
            "frame is {} bytes (max {})",
            buf.len(),
            MAX_FRAME_SIZE
        )));
    }
    if buf.len() < HEADER_SIZE {
        return Err(SidebandError::InvalidFrame(format!(
            "frame too short: {} bytes (need at least {})",
            buf.len(),
            HEADER_SIZE
        )));
    }

    let frame_kind = buf[0];
    let flags = buf[1];
    if flags != 0 {
        return Err(SidebandError::InvalidFrame(format!(
            "reserved flags must be 0, got {:#04x}",
            flags
        )));
    }
    let id = FrameId::from_bytes(&buf[2..HEADER_SIZE])?;
    let payload = &buf[HEADER_SIZE..];

    let body = match frame_kind {
        kind::CONTROL => decode_control(payload)?,
        kind::MESSAGE => decode_message(payload)?,
        kind::ACK => decode_ack(payload)?,
        kind::ERROR => decode_error(payload)?,
        other => {
            return Err(SidebandError::InvalidFrame(format!(
                "unknown frame kind {}",
                other
            )))
        }
    };

    Ok(Frame { id, body })
}

fn decode_control(payload: &[u8]) -> Result<FrameBody> {
    let (&op_byte, data) = payload.split_first().ok_or_else(|| {
        SidebandError::InvalidFrame("control frame missing op byte".to_string())
    })?;

    let control = match op_byte {
        op::HANDSHAKE => {
            if data.is_empty() {
                return Err(SidebandError::InvalidFrame(
                    "handshake data must be non-empty".to_string(),
                ));
            }
            if data.len() > MAX_HANDSHAKE_PAYLOAD {
                return Err(SidebandError::ProtocolViolation(format!(
                    "handshake payload is {} bytes (max {})",
                    data.len(),
                    MAX_HANDSHAKE_PAYLOAD
                )));
            }
            ControlFrame::Handshake {
                payload: Bytes::copy_from_slice(data),
            }
        }
        op::PING => {
            if !data.is_empty() {
                return Err(SidebandError::InvalidFrame(
                    "ping must not carry data".to_string(),
                ));
            }
            ControlFrame::Ping
        }
        op::PONG => {
            if !data.is_empty() {
                return Err(SidebandError::InvalidFrame(
                    "pong must not carry data".to_string(),
                ));
            }
            ControlFrame::Pong
        }
        op::CLOSE => {
            let reason = if data.is_empty() {
                None
            } else {
                Some(utf8_field("close reason", data)?.to_string())
            };
            ControlFrame::Close { reason }
        }
        other => {
            return Err(SidebandError::InvalidFrame(format!(
                "unknown control op {}",
                other
            )))
        }
    };

    Ok(FrameBody::Control(control))
}

fn decode_message(payload: &[u8]) -> Result<FrameBody> {
    if payload.len() < 4 {
        return Err(SidebandError::InvalidFrame(
            "message frame missing subject length".to_string(),
        ));
    }
    let subject_len = u32::from_le_bytes(payload[..4].try_into().expect("4 bytes")) as usize;
    let rest = &payload[4..];
    if subject_len > rest.len() {
        return Err(SidebandError::InvalidFrame(format!(
            "subject length {} exceeds remaining payload {}",
            subject_len,
            rest.len()
        )));
    }
    let subject = Subject::validate(utf8_field("subject", &rest[..subject_len])?)?;
    Ok(FrameBody::Message {
        subject,
        data: Bytes::copy_from_slice(&rest[subject_len..]),
    })
}

fn decode_ack(payload: &[u8]) -> Result<FrameBody> {
    if payload.len() != FRAME_ID_LEN {
        return Err(SidebandError::InvalidFrame(format!(
            "ack payload must be exactly {} bytes, got {}",
            FRAME_ID_LEN,
            payload.len()
        )));
    }
    Ok(FrameBody::Ack {
        ack_id: FrameId::from_bytes(payload)?,
    })
}

fn decode_error(payload: &[u8]) -> Result<FrameBody> {
    if payload.len() < 6 {
        return Err(SidebandError::InvalidFrame(format!(
            "error frame payload is {} bytes (need at least 6)",
            payload.len()
        )));
    }
    let code = u16::from_le_bytes(payload[..2].try_into().expect("2 bytes"));
    let message_len = u32::from_le_bytes(payload[2..6].try_into().expect("4 bytes")) as usize;
    let rest = &payload[6..];
    if message_len > rest.len() {
        return Err(SidebandError::InvalidFrame(format!(
            "error message length {} exceeds remaining payload {}",
            message_len,
            rest.len()
        )));
    }
    let message = utf8_field("error message", &rest[..message_len])?.to_string();
    let details = &rest[message_len..];
    if details.len() > MAX_ERROR_DETAILS {
        return Err(SidebandError::ProtocolViolation(format!(
            "error details are {} bytes (max {})",
            details.len(),
            MAX_ERROR_DETAILS
        )));
    }
    let details = if details.is_empty() {
        None
    } else {
        Some(Bytes::copy_from_slice(details))
    };
    Ok(FrameBody::Error {
        code,
        message,
        details,
    })
}

fn utf8_field<'a>(field: &str, bytes: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|_| SidebandError::InvalidFrame(format!("{} is not valid UTF-8", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id() -> FrameId {
        FrameId::from_hex("00112233445566778899aabbccddeeff").unwrap()
    }

    #[test]
    fn test_ping_wire_layout() {
        let frame = Frame::ping().with_id(test_id());
        let bytes = encode_frame(&frame).unwrap();
        let expected: Vec<u8> = [
            &[0x00, 0x00][..],
            &[
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc,
                0xdd, 0xee, 0xff,
            ],
            &[0x01],
        ]
        .concat();
        assert_eq!(bytes.len(), 19);
        assert_eq!(bytes.as_ref(), expected.as_slice());

        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.id, test_id());
        assert_eq!(decoded.body, FrameBody::Control(ControlFrame::Ping));
    }

    #[test]
    fn test_message_wire_layout() {
        let subject = Subject::validate("rpc/echo").unwrap();
        let frame = Frame::message(subject, Bytes::from_static(b"hello"));
        let bytes = encode_frame(&frame).unwrap();

        // kind + flags + id + length + "rpc/echo" + "hello"
        assert_eq!(bytes.len(), 1 + 1 + 16 + 4 + 8 + 5);
        assert_eq!(bytes[0], kind::MESSAGE);
        assert_eq!(bytes[1], 0);
        assert_eq!(&bytes[18..22], &8u32.to_le_bytes());
        assert_eq!(&bytes[22..30], b"rpc/echo");
        assert_eq!(&bytes[30..], b"hello");

        let decoded = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.subject().unwrap().as_str(), "rpc/echo");
        assert_eq!(decoded.data().unwrap().as_ref(), b"hello");
        assert_eq!(decoded.id, frame.id);
    }

    #[test]
    fn test_roundtrip_all_variants() {
        let subject = Subject::validate("app/metrics").unwrap();
        let frames = vec![
            Frame::handshake(Bytes::from_static(b"{\"protocol\":\"sideband\"}")).unwrap(),
            Frame::ping(),
            Frame::pong(),
            Frame::close(None),
            Frame::close(Some("shutting down".to_string())),
            Frame::message(subject, Bytes::from_static(b"payload")),
            Frame::message(Subject::validate("event/x").unwrap(), Bytes::new()),
            Frame::ack(FrameId::generate()),
            Frame::error(2001, "nope", None),
            Frame::error(1000, "bad subject", Some(Bytes::from_static(b"detail"))),
        ];
        for frame in frames {
            let bytes = encode_frame(&frame).unwrap();
            let decoded = decode_frame(&bytes).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_decode_rejects_short_buffers() {
        for len in 0..HEADER_SIZE {
            let buf = vec![0u8; len];
            let err = decode_frame(&buf).unwrap_err();
            assert!(
                matches!(err, SidebandError::InvalidFrame(_)),
                "len {} gave {:?}",
                len,
                err
            );
        }
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let mut buf = encode_frame(&Frame::ping()).unwrap().to_vec();
        buf[0] = 99;
        let err = decode_frame(&buf).unwrap_err();
        assert!(matches!(err, SidebandError::InvalidFrame(_)));
        assert!(err.to_string().contains("unknown frame kind"));
    }

    #[test]
    fn test_decode_rejects_reserved_flags() {
        for flags in [1u8, 0x40, 0x80, 0xff] {
            let mut buf = encode_frame(&Frame::ping()).unwrap().to_vec();
            buf[1] = flags;
            let err = decode_frame(&buf).unwrap_err();
            assert!(matches!(err, SidebandError::InvalidFrame(_)));
        }
    }

    #[test]
    fn test_decode_rejects_ping_with_data() {
        let mut buf = encode_frame(&Frame::ping()).unwrap().to_vec();
        buf.push(0xAB);
        let err = decode_frame(&buf).unwrap_err();
        assert!(err.to_string().contains("ping"));
    }

    #[test]
    fn test_decode_rejects_pong_with_data() {
        let mut buf = encode_frame(&Frame::pong()).unwrap().to_vec();
        buf.extend_from_slice(b"xx");
        assert!(decode_frame(&buf).is_err());
    }

    #[test]
    fn test_decode_rejects_empty_handshake() {
        let mut buf = Vec::new();
        buf.push(kind::CONTROL);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.push(op::HANDSHAKE);
        let err = decode_frame(&buf).unwrap_err();
        assert!(err.to_string().contains("handshake"));
    }

    #[test]
    fn test_decode_rejects_missing_op_byte() {
        let mut buf = Vec::new();
        buf.push(kind::CONTROL);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        let err = decode_frame(&buf).unwrap_err();
        assert!(matches!(err, SidebandError::InvalidFrame(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_control_op() {
        let mut buf = Vec::new();
        buf.push(kind::CONTROL);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.push(7);
        let err = decode_frame(&buf).unwrap_err();
        assert!(err.to_string().contains("unknown control op"));
    }

    #[test]
    fn test_decode_rejects_message_missing_length() {
        let mut buf = Vec::new();
        buf.push(kind::MESSAGE);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.extend_from_slice(&[0x08, 0x00]); // truncated length field
        assert!(decode_frame(&buf).is_err());
    }

    #[test]
    fn test_decode_rejects_subject_length_overrun() {
        let mut buf = Vec::new();
        buf.push(kind::MESSAGE);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(b"rpc"); // only 3 bytes follow
        let err = decode_frame(&buf).unwrap_err();
        assert!(err.to_string().contains("exceeds remaining"));
    }

    #[test]
    fn test_decode_rejects_bad_subject_prefix() {
        let mut buf = Vec::new();
        buf.push(kind::MESSAGE);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(b"foo/bar");
        let err = decode_frame(&buf).unwrap_err();
        assert!(matches!(err, SidebandError::ProtocolViolation(_)));
    }

    #[test]
    fn test_decode_rejects_invalid_subject_utf8() {
        let mut buf = Vec::new();
        buf.push(kind::MESSAGE);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&[0xff, 0xfe, 0xfd, 0xfc]);
        let err = decode_frame(&buf).unwrap_err();
        assert!(matches!(err, SidebandError::InvalidFrame(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_ack_length() {
        for len in [15usize, 17] {
            let mut buf = Vec::new();
            buf.push(kind::ACK);
            buf.push(0);
            buf.extend_from_slice(test_id().as_bytes());
            buf.extend_from_slice(&vec![0u8; len]);
            let err = decode_frame(&buf).unwrap_err();
            assert!(matches!(err, SidebandError::InvalidFrame(_)), "len {}", len);
        }
    }

    #[test]
    fn test_decode_rejects_short_error_payload() {
        for len in 0..6 {
            let mut buf = Vec::new();
            buf.push(kind::ERROR);
            buf.push(0);
            buf.extend_from_slice(test_id().as_bytes());
            buf.extend_from_slice(&vec![0u8; len]);
            assert!(decode_frame(&buf).is_err(), "len {}", len);
        }
    }

    #[test]
    fn test_decode_rejects_error_message_overrun() {
        let mut buf = Vec::new();
        buf.push(kind::ERROR);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.extend_from_slice(&1000u16.to_le_bytes());
        buf.extend_from_slice(&50u32.to_le_bytes());
        buf.extend_from_slice(b"short");
        let err = decode_frame(&buf).unwrap_err();
        assert!(err.to_string().contains("exceeds remaining"));
    }

    #[test]
    fn test_error_frame_with_empty_details_decodes_as_none() {
        let frame = Frame::error(1002, "bad", None);
        let decoded = decode_frame(&encode_frame(&frame).unwrap()).unwrap();
        match decoded.body {
            FrameBody::Error { details, .. } => assert!(details.is_none()),
            _ => panic!("expected error body"),
        }
    }

    #[test]
    fn test_encode_rejects_oversize_handshake() {
        let frame = Frame::handshake(Bytes::from(vec![b'x'; MAX_HANDSHAKE_PAYLOAD + 1])).unwrap();
        let err = encode_frame(&frame).unwrap_err();
        assert!(matches!(err, SidebandError::ProtocolViolation(_)));
    }

    #[test]
    fn test_encode_rejects_oversize_frame() {
        let subject = Subject::validate("app/bulk").unwrap();
        let frame = Frame::message(subject, Bytes::from(vec![0u8; MAX_FRAME_SIZE]));
        let err = encode_frame(&frame).unwrap_err();
        assert!(matches!(err, SidebandError::ProtocolViolation(_)));
    }

    #[test]
    fn test_decode_rejects_oversize_buffer() {
        let buf = vec![0u8; MAX_FRAME_SIZE + 1];
        let err = decode_frame(&buf).unwrap_err();
        assert!(matches!(err, SidebandError::ProtocolViolation(_)));
    }

    #[test]
    fn test_decoded_payload_does_not_alias_input() {
        let subject = Subject::validate("rpc/echo").unwrap();
        let frame = Frame::message(subject, Bytes::from_static(b"hello"));
        let mut buf = encode_frame(&frame).unwrap().to_vec();
        let decoded = decode_frame(&buf).unwrap();
        // Mutating the input buffer after decode must not change the frame.
        for b in buf.iter_mut() {
            *b = 0;
        }
        assert_eq!(decoded.data().unwrap().as_ref(), b"hello");
        assert_eq!(decoded.subject().unwrap().as_str(), "rpc/echo");
    }

    #[test]
    fn test_close_reason_utf8_enforced() {
        let mut buf = Vec::new();
        buf.push(kind::CONTROL);
        buf.push(0);
        buf.extend_from_slice(test_id().as_bytes());
        buf.push(op::CLOSE);
        buf.extend_from_slice(&[0xff, 0xfe]);
        assert!(decode_frame(&buf).is_err());
    }
}
