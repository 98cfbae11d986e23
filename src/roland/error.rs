//! Codec error kinds
//!
//! Build-time errors reject a single operation. Parse-time errors other than
//! [`CodecError::MalformedFrame`] are carried inline in a `ParsedReply`.

use thiserror::Error;

use super::address::Address;

/// Errors raised while building or parsing Roland sysex frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Symbolic name not present in the address table
    #[error("unknown address name '{0}'")]
    UnknownAddress(String),

    /// Inbound address not covered by any table entry
    #[error("unmapped address {0}")]
    UnmappedAddress(Address),

    /// Framing, length or command byte invalid; the frame is discarded
    #[error("malformed sysex frame: {0}")]
    MalformedFrame(String),

    /// Value does not fit the width declared for the entry
    #[error("value {value} out of range for '{name}' (max {max})")]
    ValueOutOfRange {
        name: String,
        value: u32,
        max: u32,
    },

    /// Checksum byte does not match the recomputed one
    #[error("checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Reply carried fewer payload bytes than the entry declares
    #[error("short payload for '{name}': expected {expected} bytes, got {actual}")]
    ShortPayload {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl CodecError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        CodecError::MalformedFrame(reason.into())
    }
}
