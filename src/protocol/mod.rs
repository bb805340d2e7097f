//! Protocol module: frame identifiers, subjects, wire codec, and the
//! byte-stream adapter.
//!
//! Everything here is purely synchronous: no shared state, no I/O.
//! Concurrent encodes and decodes on disjoint inputs need no
//! synchronization, and decoded frames are immutable values that can be
//! shared across threads freely.

mod frame;
mod frame_id;
mod stream;
mod subject;
pub mod wire;

pub use frame::{ControlFrame, Frame, FrameBody};
pub use frame_id::{FrameId, FRAME_ID_LEN};
pub use stream::{encode_stream_frame, StreamDecoder, LENGTH_PREFIX_SIZE};
pub use subject::{Subject, MAX_SUBJECT_LEN, SUBJECT_PREFIXES};
pub use wire::{
    decode_frame, encode_frame, HEADER_SIZE, MAX_ERROR_DETAILS, MAX_FRAME_SIZE,
    MAX_HANDSHAKE_PAYLOAD,
};
