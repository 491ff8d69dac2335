// Error types for the wire codec.
//
// Decoding and encoding fail in disjoint ways, so they get separate enums.
// `DecodeError::Incomplete` is the one recoverable decode condition: it
// means "wait for more bytes" and never escapes `decode_all`, which turns
// it into leftover. Everything else is a framing error after which the
// stream can no longer be trusted; `decode_all` reports it as a
// `FrameError` alongside whatever decoded cleanly before it.

use crate::types::Packet;

/// Errors raised while turning bytes into messages.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended inside a message.
    #[error("incomplete message: {needed} more bytes needed")]
    Incomplete { needed: usize },

    /// A length or count field is negative or implausibly large.
    #[error("invalid length {length} for field `{field}`")]
    InvalidLength { field: &'static str, length: i64 },

    /// A string field is not valid UTF-8.
    #[error("field `{field}` is not valid UTF-8")]
    InvalidString { field: &'static str },

    /// A metadata entry uses a type code with no known layout.
    #[error("unknown metadata type code {code}")]
    BadMetadataType { code: u8 },

    /// The byte feed was closed while a read was pending.
    #[error("byte feed closed")]
    Closed,

    /// A second read was issued while another was still waiting for bytes.
    #[error("a read is already pending on this feed")]
    ReadAlreadyPending,
}

/// A malformed message ended a scan. `decoded` holds the complete messages
/// that preceded it, in arrival order.
#[derive(Debug, thiserror::Error)]
#[error("{error} (after {} complete messages)", .decoded.len())]
pub struct FrameError {
    pub decoded: Vec<Packet>,
    #[source]
    pub error: DecodeError,
}

/// Errors raised while turning a named message into bytes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unknown message `{0}`")]
    UnknownMessage(String),

    #[error("message `{message}` is missing required field `{field}`")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },

    #[error("field `{field}` of `{message}` expects {expected}, got {found}")]
    TypeMismatch {
        message: &'static str,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("value for field `{field}` of `{message}` is out of range")]
    OutOfRange {
        message: &'static str,
        field: &'static str,
    },

    #[error("array `{field}` of `{message}` has {actual} elements but its count says {declared}")]
    CountMismatch {
        message: &'static str,
        field: &'static str,
        declared: i64,
        actual: usize,
    },
}

/// A decoded message lacks a field of the expected type.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("field `{name}` missing or not {expected}")]
pub struct FieldError {
    pub name: &'static str,
    pub expected: &'static str,
}
