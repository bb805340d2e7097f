//! Subject validation.
//!
//! A subject is the routing key on a message frame. The prefix set is
//! closed in v1; extending it is a protocol-version change.

use std::fmt;

use crate::error::{Result, SidebandError};

/// Maximum subject length in UTF-8 bytes.
pub const MAX_SUBJECT_LEN: usize = 256;

/// The four reserved subject prefixes. `stream/` is reserved for future
/// use but accepted by the validator.
pub const SUBJECT_PREFIXES: [&str; 4] = ["rpc/", "event/", "stream/", "app/"];

/// A validated routing key.
///
/// Guaranteed to be 1..=256 UTF-8 bytes, free of NUL bytes, and to begin
/// with one of the reserved prefixes. Carries the original string
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject(String);

impl Subject {
    /// Validate a routing key.
    ///
    /// Length is measured in UTF-8 bytes, not code points; multi-byte
    /// characters count fully.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the subject is empty, longer than
    /// 256 bytes, contains a NUL byte, or does not begin with one of
    /// `rpc/`, `event/`, `stream/`, `app/`.
    pub fn validate(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(SidebandError::ProtocolViolation(
                "subject must not be empty".to_string(),
            ));
        }
        if text.len() > MAX_SUBJECT_LEN {
            return Err(SidebandError::ProtocolViolation(format!(
                "subject is {} bytes (max {})",
                text.len(),
                MAX_SUBJECT_LEN
            )));
        }
        if text.contains('\0') {
            return Err(SidebandError::ProtocolViolation(
                "subject must not contain a null byte".to_string(),
            ));
        }
        if !SUBJECT_PREFIXES.iter().any(|p| text.starts_with(p)) {
            return Err(SidebandError::ProtocolViolation(format!(
                "subject {:?} must begin with one of rpc/, event/, stream/, app/",
                text
            )));
        }
        Ok(Self(text.to_string()))
    }

    /// The validated string, verbatim as passed to `validate`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The UTF-8 byte form used on the wire.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
