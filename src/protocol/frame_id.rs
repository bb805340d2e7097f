//! Frame identifiers.
//!
//! Every frame on the wire carries a 16-byte opaque identifier drawn from
//! a cryptographic random source. The bytes have no internal structure;
//! nothing in the codec interprets them. The 32-character lowercase hex
//! form exists only for logging and for carrying correlation ids through
//! JSON envelopes.

use std::fmt;

use rand::RngCore;

use crate::error::{Result, SidebandError};

/// Length of a frame identifier in bytes.
pub const FRAME_ID_LEN: usize = 16;

/// Opaque 16-byte identifier for one frame instance on the wire.
///
/// Also used as the correlation id linking a response envelope back to
/// its request. Copyable value type; freely shareable across threads.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId([u8; FRAME_ID_LEN]);

impl FrameId {
    /// Generate a fresh identifier from the system's cryptographic RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; FRAME_ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Build an identifier from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrame` if the slice is not exactly 16 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; FRAME_ID_LEN] = bytes.try_into().map_err(|_| {
            SidebandError::InvalidFrame(format!(
                "frame id must be {} bytes, got {}",
                FRAME_ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse the 32-character lowercase hex form back into an identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrame` unless the input is exactly 32 lowercase
    /// hex characters.
    pub fn from_hex(text: &str) -> Result<Self> {
        if text.len() != FRAME_ID_LEN * 2
            || !text.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(SidebandError::InvalidFrame(format!(
                "frame id hex must match [0-9a-f]{{32}}, got {:?}",
                text
            )));
        }
        let bytes = hex::decode(text)
            .map_err(|e| SidebandError::InvalidFrame(format!("frame id hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// The raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; FRAME_ID_LEN] {
        &self.0
    }

    /// The 32-character lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.to_hex())
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_16_bytes() {
        let id = FrameId::generate();
        assert_eq!(id.as_bytes().len(), FRAME_ID_LEN);
    }

    #[test]
    fn test_generate_no_collisions() {
        use std::collections::HashSet;
        let ids: HashSet<FrameId> = (0..10_000).map(|_| FrameId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert!(matches!(
            FrameId::from_bytes(&[0u8; 15]),
            Err(SidebandError::InvalidFrame(_))
        ));
        assert!(matches!(
            FrameId::from_bytes(&[0u8; 17]),
            Err(SidebandError::InvalidFrame(_))
        ));
        assert!(FrameId::from_bytes(&[0u8; 16]).is_ok());
    }

    #[test]
    fn test_hex_roundtrip() {
        let id = FrameId::generate();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
        assert_eq!(FrameId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn test_hex_roundtrip_from_string() {
        let hex = "00112233445566778899aabbccddeeff";
        let id = FrameId::from_hex(hex).unwrap();
        assert_eq!(id.to_hex(), hex);
        assert_eq!(
            id.as_bytes(),
            &[
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc,
                0xdd, 0xee, 0xff
            ]
        );
    }

    #[test]
    fn test_from_hex_rejects_uppercase() {
        assert!(FrameId::from_hex("00112233445566778899AABBCCDDEEFF").is_err());
    }

    #[test]
    fn test_from_hex_rejects_bad_length() {
        assert!(FrameId::from_hex("0011").is_err());
        assert!(FrameId::from_hex("00112233445566778899aabbccddeeff00").is_err());
        assert!(FrameId::from_hex("").is_err());
    }

    #[test]
    fn test_from_hex_rejects_non_hex() {
        assert!(FrameId::from_hex("zz112233445566778899aabbccddeeff").is_err());
    }

    #[test]
    fn test_zero_padding_per_byte() {
        let id = FrameId::from_bytes(&[0x01; 16]).unwrap();
        assert_eq!(id.to_hex(), "01".repeat(16));
    }

    #[test]
    fn test_display_matches_hex() {
        let id = FrameId::generate();
        assert_eq!(format!("{}", id), id.to_hex());
    }
}
