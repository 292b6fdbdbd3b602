//! Codec trait and the JSON implementation.
//!
//! The transport layer carries opaque text payloads; a codec converts
//! between those payloads and Rust types. Everything above the transport
//! goes through the [`Codec`] trait, so swapping the wire representation
//! is a one-type change.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values into text payloads and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a payload.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a payload back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the payload is malformed or
    /// does not match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        payload: &str,
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        payload: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(payload).map_err(ProtocolError::Decode)
    }
}
