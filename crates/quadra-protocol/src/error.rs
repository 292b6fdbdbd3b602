//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a payload).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a payload into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, wrong
    /// data types, or a truncated payload.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates protocol rules — a missing or
    /// mistyped `data` field, an out-of-catalog value, and so on.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The message kind is not one of the four in-game actions.
    #[error("message kind {0} is not an action")]
    NotAnAction(String),
}
