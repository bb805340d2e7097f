//! Error types for the sideband core.

use thiserror::Error;

/// Numeric error codes carried in Error frames and error envelopes.
///
/// The 1000-1999 range is reserved for protocol errors; 2000 and above
/// belong to applications.
pub mod codes {
    /// A structurally valid frame violated a protocol contract.
    pub const PROTOCOL_VIOLATION: u16 = 1000;
    /// Handshake protocol or version did not match.
    pub const UNSUPPORTED_VERSION: u16 = 1001;
    /// The frame bytes themselves were malformed.
    pub const INVALID_FRAME: u16 = 1002;
    /// First code available to applications.
    pub const APPLICATION_BASE: u16 = 2000;
}

/// Main error type for all sideband core operations.
#[derive(Debug, Error)]
pub enum SidebandError {
    /// A structurally valid frame or field violated a protocol contract
    /// (bad subject, oversize payload). Fatal at connection scope.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Handshake protocol name or version mismatch. Fatal.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// Malformed frame bytes: truncated buffer, inconsistent lengths,
    /// reserved bits set, bad UTF-8, invalid frame id. Fatal.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Application-level failure carried in an error envelope or an
    /// Error frame with code >= 2000. Non-fatal; surfaced to the caller.
    #[error("application error {code}: {message}")]
    Application {
        /// Numeric application error code (>= 2000).
        code: u16,
        /// Human-readable message from the peer. Untrusted input.
        message: String,
    },

    /// Local misuse of the correlation engine: duplicate register, or
    /// resolve/reject on an unknown correlation id.
    #[error("correlation error: {0}")]
    Correlation(String),

    /// A pending request's deadline elapsed before any response arrived.
    #[error("request timed out")]
    Timeout,

    /// All pending requests were rejected during connection teardown.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// A pending request was cancelled by its caller.
    #[error("request cancelled")]
    Cancelled,

    /// I/O error from the surrounding transport driver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (envelope and handshake codecs).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SidebandError {
    /// The wire code to carry in an outbound Error frame for this error,
    /// if the error maps onto the wire at all.
    ///
    /// Correlation, timeout and disconnect errors are local and never
    /// cross the wire; they return `None`.
    pub fn wire_code(&self) -> Option<u16> {
        match self {
            SidebandError::ProtocolViolation(_) => Some(codes::PROTOCOL_VIOLATION),
            SidebandError::UnsupportedVersion(_) => Some(codes::UNSUPPORTED_VERSION),
            SidebandError::InvalidFrame(_) | SidebandError::Json(_) => Some(codes::INVALID_FRAME),
            SidebandError::Application { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias using SidebandError.
pub type Result<T> = std::result::Result<T, SidebandError>;
