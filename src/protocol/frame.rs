//! Frame types with constructors and typed accessors.
//!
//! A decoded frame is a fact: every constructor validates its variant's
//! contract, payload bytes are held as `bytes::Bytes` so no caller can
//! mutate them through a shared view, and the codec re-checks the same
//! contracts on both encode and decode.

use bytes::Bytes;

use super::frame_id::FrameId;
use super::subject::Subject;
use crate::error::{Result, SidebandError};

/// Control operations carried in a control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    /// First frame on a connection; carries the handshake payload.
    /// Data is required and must be non-empty.
    Handshake {
        /// Encoded handshake payload (see [`crate::handshake`]).
        payload: Bytes,
    },
    /// Liveness probe. Carries no data.
    Ping,
    /// Reply to a ping. Carries no data.
    Pong,
    /// Connection close, with an optional UTF-8 reason.
    Close {
        /// Human-readable close reason, if any.
        reason: Option<String>,
    },
}

/// Type-specific payload of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    /// Control operation (handshake, ping, pong, close).
    Control(ControlFrame),
    /// Routable application message: validated subject plus opaque data.
    Message {
        /// Routing key.
        subject: Subject,
        /// Opaque payload (may be empty).
        data: Bytes,
    },
    /// Receipt confirmation for one prior frame.
    Ack {
        /// Identifier of the acknowledged frame.
        ack_id: FrameId,
    },
    /// Error report with a numeric code and optional opaque details.
    Error {
        /// Numeric error code (1000-1999 protocol, 2000+ application).
        code: u16,
        /// Human-readable message. Untrusted on receive.
        message: String,
        /// Optional opaque details.
        details: Option<Bytes>,
    },
}

/// A complete protocol frame: identifier plus type-specific body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// This frame's own identifier, unique per emitted frame.
    pub id: FrameId,
    /// The type-specific payload.
    pub body: FrameBody,
}

impl Frame {
    /// Build a handshake control frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrame` if the payload is empty.
    pub fn handshake(payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(SidebandError::InvalidFrame(
                "handshake data must be non-empty".to_string(),
            ));
        }
        Ok(Self::with_body(FrameBody::Control(ControlFrame::Handshake {
            payload,
        })))
    }

    /// Build a ping control frame.
    pub fn ping() -> Self {
        Self::with_body(FrameBody::Control(ControlFrame::Ping))
    }

    /// Build a pong control frame.
    pub fn pong() -> Self {
        Self::with_body(FrameBody::Control(ControlFrame::Pong))
    }

    /// Build a close control frame with an optional reason.
    pub fn close(reason: Option<String>) -> Self {
        Self::with_body(FrameBody::Control(ControlFrame::Close { reason }))
    }

    /// Build a message frame from a validated subject and opaque data.
    pub fn message(subject: Subject, data: impl Into<Bytes>) -> Self {
        Self::with_body(FrameBody::Message {
            subject,
            data: data.into(),
        })
    }

    /// Build an ack referencing a prior frame's identifier.
    ///
    /// The ack gets a fresh identifier of its own; the target's id only
    /// appears in the payload, never reused as an outbound frame id.
    pub fn ack(ack_id: FrameId) -> Self {
        Self::with_body(FrameBody::Ack { ack_id })
    }

    /// Build an ack for a received frame.
    pub fn ack_for(frame: &Frame) -> Self {
        Self::ack(frame.id)
    }

    /// Build an error frame.
    pub fn error(code: u16, message: impl Into<String>, details: Option<Bytes>) -> Self {
        Self::with_body(FrameBody::Error {
            code,
            message: message.into(),
            details,
        })
    }

    /// Build the error frame a driver should emit for a fatal codec
    /// error before closing the connection. Returns `None` for errors
    /// that never cross the wire (correlation, timeout, disconnect).
    pub fn for_error(err: &SidebandError) -> Option<Self> {
        err.wire_code()
            .map(|code| Self::error(code, err.to_string(), None))
    }

    fn with_body(body: FrameBody) -> Self {
        Self {
            id: FrameId::generate(),
            body,
        }
    }

    /// Replace the generated identifier. Intended for tests and for
    /// drivers that pre-allocate the id as a correlation id.
    pub fn with_id(mut self, id: FrameId) -> Self {
        self.id = id;
        self
    }

    /// Check if this is a control frame.
    #[inline]
    pub fn is_control(&self) -> bool {
        matches!(self.body, FrameBody::Control(_))
    }

    /// Check if this is a message frame.
    #[inline]
    pub fn is_message(&self) -> bool {
        matches!(self.body, FrameBody::Message { .. })
    }

    /// Check if this is an ack frame.
    #[inline]
    pub fn is_ack(&self) -> bool {
        matches!(self.body, FrameBody::Ack { .. })
    }

    /// Check if this is an error frame.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.body, FrameBody::Error { .. })
    }

    /// The subject, if this is a message frame.
    pub fn subject(&self) -> Option<&Subject> {
        match &self.body {
            FrameBody::Message { subject, .. } => Some(subject),
            _ => None,
        }
    }

    /// The message data, if this is a message frame.
    pub fn data(&self) -> Option<&Bytes> {
        match &self.body {
            FrameBody::Message { data, .. } => Some(data),
            _ => None,
        }
    }
}
