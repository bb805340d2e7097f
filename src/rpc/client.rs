//! RPC send/receive glue.
//!
//! [`RpcClient`] wires the codecs to the correlation registry: `call`
//! builds a request envelope, wraps it in an `rpc/<method>` message
//! frame, registers the pending entry, and hands the encoded bytes to
//! the transport via an outbound channel; `handle_frame` takes each
//! decoded inbound frame and resolves pending entries, answers pings,
//! and surfaces anything the application itself must serve.
//!
//! The client never retries and never reorders; ordering and
//! reliability are the transport's contract.

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use super::pending::PendingRequests;
use crate::envelope::RpcEnvelope;
use crate::error::{Result, SidebandError};
use crate::protocol::{encode_frame, ControlFrame, Frame, FrameBody, FrameId, Subject};

/// What an inbound frame amounted to, for the driver above the client.
#[derive(Debug)]
pub enum Inbound {
    /// A frame the driver should send back (pong for ping).
    Reply(Frame),
    /// An inbound request the application must serve, then answer via
    /// [`RpcClient::respond_ok`] or [`RpcClient::respond_err`].
    Request {
        /// Subject of the enclosing message frame.
        subject: Subject,
        /// The decoded request envelope.
        envelope: RpcEnvelope,
    },
    /// An inbound fire-and-forget notification.
    Notification {
        /// Subject of the enclosing message frame.
        subject: Subject,
        /// The decoded notification envelope.
        envelope: RpcEnvelope,
    },
    /// Consumed internally: a response matched to a pending request, an
    /// ack, or a control frame the driver sequences itself.
    Handled,
}

/// Caller-side RPC endpoint over one connection.
///
/// Cheaply cloneable; clones share the pending registry and the
/// outbound channel.
#[derive(Clone)]
pub struct RpcClient {
    pending: PendingRequests<RpcEnvelope>,
    outbound: mpsc::Sender<Bytes>,
}

impl RpcClient {
    /// Create a client that hands encoded frames to `outbound` and
    /// times pending requests out after `timeout`.
    pub fn new(outbound: mpsc::Sender<Bytes>, timeout: std::time::Duration) -> Self {
        Self {
            pending: PendingRequests::new(timeout),
            outbound,
        }
    }

    /// Call `method` on the peer and await its response.
    ///
    /// The request's correlation id doubles as the message frame's
    /// identifier. Returns the success result (if any), or the peer's
    /// error envelope as [`SidebandError::Application`].
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Option<Value>> {
        let subject = Subject::validate(&format!("rpc/{}", method))?;
        let cid = FrameId::generate();
        let envelope = RpcEnvelope::Request {
            method: method.to_string(),
            params,
            cid,
        };
        let frame = Frame::message(subject, envelope.encode()?).with_id(cid);
        let bytes = encode_frame(&frame)?;

        // Register before sending so a fast response cannot race the
        // registration.
        let handle = self.pending.register(cid)?;
        if self.send(bytes).await.is_err() {
            let _ = self.pending.cancel(cid);
            return Err(SidebandError::Disconnected(
                "outbound channel closed".to_string(),
            ));
        }

        match handle.wait().await? {
            RpcEnvelope::Success { result, .. } => Ok(result),
            RpcEnvelope::Error { code, message, .. } => {
                Err(SidebandError::Application { code, message })
            }
            other => Err(SidebandError::ProtocolViolation(format!(
                "pending request resolved with a non-response envelope: {:?}",
                other
            ))),
        }
    }

    /// Send a fire-and-forget notification on `event/<name>`.
    pub async fn notify(&self, event: &str, data: Option<Value>) -> Result<()> {
        let subject = Subject::validate(&format!("event/{}", event))?;
        let envelope = RpcEnvelope::Notification {
            event: event.to_string(),
            data,
        };
        let frame = Frame::message(subject, envelope.encode()?);
        self.send(encode_frame(&frame)?).await
    }

    /// Answer an inbound request with a success envelope, copying its
    /// correlation id verbatim. The response frame gets its own fresh
    /// identifier.
    pub async fn respond_ok(
        &self,
        subject: Subject,
        cid: FrameId,
        result: Option<Value>,
    ) -> Result<()> {
        let envelope = RpcEnvelope::Success { result, cid };
        let frame = Frame::message(subject, envelope.encode()?);
        self.send(encode_frame(&frame)?).await
    }

    /// Answer an inbound request with an error envelope.
    pub async fn respond_err(
        &self,
        subject: Subject,
        cid: FrameId,
        code: u16,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Result<()> {
        let envelope = RpcEnvelope::Error {
            code,
            message: message.into(),
            data,
            cid,
        };
        let frame = Frame::message(subject, envelope.encode()?);
        self.send(encode_frame(&frame)?).await
    }

    /// Route one decoded inbound frame.
    ///
    /// Response envelopes resolve their pending entry; a response whose
    /// correlation id is unknown (late arrival after timeout, or a peer
    /// bug) is surfaced as a `Correlation` error for the driver to log.
    /// Pings yield the pong to send back. Handshake and close frames
    /// are the driver's to sequence and come back as `Handled`.
    pub fn handle_frame(&self, frame: &Frame) -> Result<Inbound> {
        match &frame.body {
            FrameBody::Control(ControlFrame::Ping) => Ok(Inbound::Reply(Frame::pong())),
            FrameBody::Control(_) => Ok(Inbound::Handled),
            FrameBody::Ack { ack_id } => {
                tracing::trace!(ack_id = %ack_id, "frame acknowledged");
                Ok(Inbound::Handled)
            }
            FrameBody::Error { code, message, .. } => {
                tracing::warn!(code, message = %message.as_str(), "peer reported an error frame");
                Ok(Inbound::Handled)
            }
            FrameBody::Message { subject, data } => {
                let envelope = RpcEnvelope::decode(data)?;
                match &envelope {
                    RpcEnvelope::Success { cid, .. } | RpcEnvelope::Error { cid, .. } => {
                        // Error envelopes complete the pending handle
                        // normally; `call` turns them into application
                        // errors for its caller.
                        self.pending.resolve(*cid, envelope.clone())?;
                        Ok(Inbound::Handled)
                    }
                    RpcEnvelope::Request { .. } => Ok(Inbound::Request {
                        subject: subject.clone(),
                        envelope,
                    }),
                    RpcEnvelope::Notification { .. } => Ok(Inbound::Notification {
                        subject: subject.clone(),
                        envelope,
                    }),
                }
            }
        }
    }

    /// Reject every outstanding request with a disconnect failure.
    /// Called by the driver on connection teardown; idempotent.
    pub fn disconnect(&self) {
        self.pending.clear();
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    async fn send(&self, bytes: Bytes) -> Result<()> {
        self.outbound
            .send(bytes)
            .await
            .map_err(|_| SidebandError::Disconnected("outbound channel closed".to_string()))
    }
}
