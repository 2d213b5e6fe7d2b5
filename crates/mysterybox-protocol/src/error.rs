//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes on the wire were the problem:
//! they didn't serialize, didn't parse, or parsed into something that
//! breaks the conversation rules (e.g. a `Register` before `Handshake`).

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type` tag,
    /// missing fields, or the wrong field types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but is not allowed at this point of the
    /// conversation, e.g. a wrong protocol version in the handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
