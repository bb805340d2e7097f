//! Handshake payload codec.
//!
//! The handshake is the first frame on every connection: a control frame
//! whose data is this payload in JSON form. Protocol and version are
//! literals and must match exactly; peers advertise an identity plus
//! optional capability tokens and namespaced metadata. Unknown
//! capabilities, metadata keys, and payload fields are ignored on
//! receive so that v1 peers stay compatible with additive changes.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SidebandError};

/// The protocol name every peer must present.
pub const PROTOCOL_NAME: &str = "sideband";

/// The protocol version every peer must present.
pub const PROTOCOL_VERSION: &str = "1";

/// Structured handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    /// Protocol name; must equal [`PROTOCOL_NAME`].
    pub protocol: String,
    /// Protocol version; must equal [`PROTOCOL_VERSION`].
    pub version: String,
    /// Free-form non-empty peer identity, stable across reconnects.
    pub peer_id: String,
    /// Capability tokens, in the order the peer advertises them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps: Option<Vec<String>>,
    /// Namespaced metadata keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl HandshakePayload {
    /// Build a payload for the local peer with the fixed protocol
    /// literals filled in.
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            peer_id: peer_id.into(),
            caps: None,
            metadata: None,
        }
    }

    /// Attach capability tokens.
    pub fn with_caps(mut self, caps: Vec<String>) -> Self {
        self.caps = Some(caps);
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Serialize to the UTF-8 text form carried in a handshake frame.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Parse and validate a received handshake payload.
    ///
    /// # Errors
    ///
    /// `InvalidFrame` if the bytes are not a JSON object with string
    /// `protocol`, `version` and `peerId` fields, or if `peerId` is
    /// empty. `UnsupportedVersion` if protocol or version differ from
    /// the fixed literals.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let payload: HandshakePayload = serde_json::from_slice(bytes).map_err(|e| {
            SidebandError::InvalidFrame(format!("malformed handshake payload: {}", e))
        })?;

        if payload.protocol != PROTOCOL_NAME || payload.version != PROTOCOL_VERSION {
            return Err(SidebandError::UnsupportedVersion(format!(
                "peer offered {}/{}, this peer speaks {}/{}",
                payload.protocol, payload.version, PROTOCOL_NAME, PROTOCOL_VERSION
            )));
        }
        if payload.peer_id.is_empty() {
            return Err(SidebandError::InvalidFrame(
                "handshake peerId must be non-empty".to_string(),
            ));
        }

        Ok(payload)
    }
}
