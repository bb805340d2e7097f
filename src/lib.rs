//! # sideband
//!
//! Wire protocol and RPC correlation core of the sideband peer-to-peer
//! messaging stack.
//!
//! The core answers three questions:
//!
//! 1. How are bytes on a connection framed and parsed into typed frames?
//! 2. How are routable application messages (requests, responses,
//!    notifications) structured inside those frames?
//! 3. How does a caller match a response to an earlier request across an
//!    asynchronous boundary?
//!
//! ## Architecture
//!
//! - **Codecs** ([`protocol`], [`envelope`], [`handshake`]): pure
//!   functions, no shared state, no I/O. Safe from any execution context.
//! - **Correlation** ([`rpc`]): the one concurrent structure, a
//!   registry of pending requests with per-entry timeouts, manual
//!   rejection, and bulk clear on disconnect.
//!
//! Transports are external: any ordered, reliable, datagram-preserving
//! byte channel can drive [`protocol::encode_frame`] and
//! [`protocol::decode_frame`]. For byte streams without datagram
//! boundaries, [`protocol::StreamDecoder`] adds a length-prefix layer.
//!
//! ## Example
//!
//! ```
//! use sideband::protocol::{decode_frame, encode_frame, Frame, Subject};
//!
//! let subject = Subject::validate("rpc/echo").unwrap();
//! let frame = Frame::message(subject, &b"hello"[..]);
//! let bytes = encode_frame(&frame).unwrap();
//! assert_eq!(decode_frame(&bytes).unwrap(), frame);
//! ```

pub mod envelope;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod rpc;

pub use envelope::RpcEnvelope;
pub use error::{Result, SidebandError};
pub use handshake::HandshakePayload;
pub use protocol::{Frame, FrameBody, FrameId, Subject};
pub use rpc::{PendingRequests, RpcClient};
