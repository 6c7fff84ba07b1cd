//! # Error Types
//!
//! Errors raised while encoding or decoding shared types.

use thiserror::Error;

/// Errors from packing or unpacking a `RequestEnvelope`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Packed data was empty.
    #[error("Packed envelope is empty")]
    Empty,

    /// Packed format version not supported.
    #[error("Unsupported envelope version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u8, supported: u8 },

    /// Request type code is not part of the known set.
    #[error("Unknown request type code: {code}")]
    UnknownRequestType { code: u32 },

    /// Serialization failed.
    #[error("Envelope encode failed: {0}")]
    Encode(String),

    /// Deserialization failed.
    #[error("Envelope decode failed: {0}")]
    Decode(String),
}
