//! RPC envelope codec.
//!
//! Envelopes are the structured payloads carried inside message frames.
//! The v1 text form is JSON with single-character tags:
//!
//! | Variant | Tag | Fields |
//! |---|---|---|
//! | Request | `r` | `m` method, `p` optional params, `cid` |
//! | Success | `R` | `result` optional, `cid` |
//! | Error | `E` | `code`, `message`, `data` optional, `cid` |
//! | Notification | `N` | `e` event, `d` optional data, no `cid` |
//!
//! The correlation id travels as 32-character lowercase hex and is
//! restored to its 16-byte form on decode. Absent optional fields are
//! omitted entirely, never serialized as null. Unknown tags are decode
//! errors, not a fifth variant.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::{Result, SidebandError};
use crate::protocol::FrameId;

/// The four RPC envelope variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcEnvelope {
    /// A call expecting exactly one response with the same `cid`.
    Request {
        /// Method name (the `rpc/<method>` subject names the route).
        method: String,
        /// Optional call parameters.
        params: Option<Value>,
        /// Correlation id copied verbatim into the response.
        cid: FrameId,
    },
    /// Successful response to an earlier request.
    Success {
        /// Optional result value.
        result: Option<Value>,
        /// Correlation id of the originating request.
        cid: FrameId,
    },
    /// Error response to an earlier request.
    Error {
        /// Numeric error code (2000+ for applications).
        code: u16,
        /// Human-readable message.
        message: String,
        /// Optional error data.
        data: Option<Value>,
        /// Correlation id of the originating request.
        cid: FrameId,
    },
    /// Fire-and-forget event; no correlation id, no response.
    Notification {
        /// Event name (the `event/<name>` subject names the route).
        event: String,
        /// Optional event data.
        data: Option<Value>,
    },
}

impl RpcEnvelope {
    /// The correlation id, absent only for notifications.
    pub fn cid(&self) -> Option<FrameId> {
        match self {
            RpcEnvelope::Request { cid, .. }
            | RpcEnvelope::Success { cid, .. }
            | RpcEnvelope::Error { cid, .. } => Some(*cid),
            RpcEnvelope::Notification { .. } => None,
        }
    }

    /// Check if this envelope answers a request (success or error).
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            RpcEnvelope::Success { .. } | RpcEnvelope::Error { .. }
        )
    }

    /// Encode to the v1 JSON text form.
    pub fn encode(&self) -> Result<Bytes> {
        let mut obj = Map::new();
        match self {
            RpcEnvelope::Request {
                method,
                params,
                cid,
            } => {
                obj.insert("t".into(), Value::String("r".into()));
                obj.insert("m".into(), Value::String(method.clone()));
                if let Some(params) = params {
                    obj.insert("p".into(), params.clone());
                }
                obj.insert("cid".into(), Value::String(cid.to_hex()));
            }
            RpcEnvelope::Success { result, cid } => {
                obj.insert("t".into(), Value::String("R".into()));
                if let Some(result) = result {
                    obj.insert("result".into(), result.clone());
                }
                obj.insert("cid".into(), Value::String(cid.to_hex()));
            }
            RpcEnvelope::Error {
                code,
                message,
                data,
                cid,
            } => {
                obj.insert("t".into(), Value::String("E".into()));
                obj.insert("code".into(), Value::from(*code));
                obj.insert("message".into(), Value::String(message.clone()));
                if let Some(data) = data {
                    obj.insert("data".into(), data.clone());
                }
                obj.insert("cid".into(), Value::String(cid.to_hex()));
            }
            RpcEnvelope::Notification { event, data } => {
                obj.insert("t".into(), Value::String("N".into()));
                obj.insert("e".into(), Value::String(event.clone()));
                if let Some(data) = data {
                    obj.insert("d".into(), data.clone());
                }
            }
        }
        Ok(Bytes::from(serde_json::to_vec(&Value::Object(obj))?))
    }

    /// Decode the v1 JSON text form.
    ///
    /// # Errors
    ///
    /// `ProtocolViolation` for every shape fault: non-object input,
    /// missing or unknown tag, missing or malformed required fields,
    /// `cid` not matching `[0-9a-f]{32}`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            SidebandError::ProtocolViolation(format!("envelope is not valid JSON: {}", e))
        })?;
        let obj = value.as_object().ok_or_else(|| {
            SidebandError::ProtocolViolation("envelope must be a JSON object".to_string())
        })?;

        let tag = obj.get("t").and_then(Value::as_str).ok_or_else(|| {
            SidebandError::ProtocolViolation("envelope missing string tag 't'".to_string())
        })?;

        match tag {
            "r" => Ok(RpcEnvelope::Request {
                method: required_string(obj, "m")?,
                params: obj.get("p").cloned(),
                cid: decode_cid(obj)?,
            }),
            "R" => Ok(RpcEnvelope::Success {
                result: obj.get("result").cloned(),
                cid: decode_cid(obj)?,
            }),
            "E" => {
                let code = obj
                    .get("code")
                    .and_then(Value::as_u64)
                    .filter(|c| *c <= u16::MAX as u64)
                    .ok_or_else(|| {
                        SidebandError::ProtocolViolation(
                            "error envelope missing 16-bit numeric 'code'".to_string(),
                        )
                    })?;
                Ok(RpcEnvelope::Error {
                    code: code as u16,
                    message: required_string(obj, "message")?,
                    data: obj.get("data").cloned(),
                    cid: decode_cid(obj)?,
                })
            }
            "N" => Ok(RpcEnvelope::Notification {
                event: required_string(obj, "e")?,
                data: obj.get("d").cloned(),
            }),
            other => Err(SidebandError::ProtocolViolation(format!(
                "unknown envelope tag {:?}",
                other
            ))),
        }
    }
}

fn required_string(obj: &Map<String, Value>, field: &str) -> Result<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            SidebandError::ProtocolViolation(format!(
                "envelope missing string field {:?}",
                field
            ))
        })
}

fn decode_cid(obj: &Map<String, Value>) -> Result<FrameId> {
    let hex = obj.get("cid").and_then(Value::as_str).ok_or_else(|| {
        SidebandError::ProtocolViolation("envelope missing string 'cid'".to_string())
    })?;
    FrameId::from_hex(hex)
        .map_err(|_| SidebandError::ProtocolViolation(format!("cid {:?} is not 32-char hex", hex)))
}
