//! Length-delimited adapter for byte-stream transports.
//!
//! The frame codec assumes a datagram-preserving transport: one encoded
//! frame per decode call. Ordered byte streams (TCP, pipes) do not
//! preserve boundaries, so this adapter prefixes each frame with a
//! 4-byte little-endian length on the way out and reassembles complete
//! frames from arbitrary read fragments on the way in.
//!
//! Uses `bytes::BytesMut` for buffer management and a two-state machine
//! for fragmented reads, the same shape as any length-prefixed decoder.

use bytes::{BufMut, Bytes, BytesMut};

use super::frame::Frame;
use super::wire::{decode_frame, encode_frame, MAX_FRAME_SIZE};
use crate::error::{Result, SidebandError};

/// Size of the stream length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode a frame with its stream length prefix.
///
/// # Errors
///
/// Propagates any frame-codec error.
pub fn encode_stream_frame(frame: &Frame) -> Result<Bytes> {
    let encoded = encode_frame(frame)?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + encoded.len());
    buf.put_u32_le(encoded.len() as u32);
    buf.put_slice(&encoded);
    Ok(buf.freeze())
}

/// Parsing state between reads.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the 4-byte length prefix.
    WaitingForLength,
    /// Length known, waiting for the frame bytes.
    WaitingForFrame { remaining: usize },
}

/// Reassembles complete frames from a fragmented byte stream.
pub struct StreamDecoder {
    buffer: BytesMut,
    state: State,
}

impl StreamDecoder {
    /// Create a new decoder with a 64 KiB initial buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
        }
    }

    /// Push raw bytes from a transport read and extract every complete
    /// frame. Partial data is buffered for the next push.
    ///
    /// # Errors
    ///
    /// `ProtocolViolation` if a declared frame length exceeds the 1 MiB
    /// cap (checked before buffering), or any frame-codec decode error.
    /// After an error the decoder state is undefined; the connection
    /// must be closed.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let len = u32::from_le_bytes(
                    self.buffer[..LENGTH_PREFIX_SIZE].try_into().expect("4 bytes"),
                ) as usize;
                if len > MAX_FRAME_SIZE {
                    return Err(SidebandError::ProtocolViolation(format!(
                        "stream frame length {} exceeds maximum {}",
                        len, MAX_FRAME_SIZE
                    )));
                }
                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                self.state = State::WaitingForFrame { remaining: len };
                self.try_extract_one()
            }
            State::WaitingForFrame { remaining } => {
                if self.buffer.len() < remaining {
                    return Ok(None);
                }
                let datagram = self.buffer.split_to(remaining);
                self.state = State::WaitingForLength;
                let frame = decode_frame(&datagram)?;
                Ok(Some(frame))
            }
        }
    }

    /// Number of buffered bytes awaiting a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the decoder holds no partial data.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && matches!(self.state, State::WaitingForLength)
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}
