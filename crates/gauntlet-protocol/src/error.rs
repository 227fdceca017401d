//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes were wrong, never the game
//! state. The connection handler logs these and drops the frame.

/// Errors that can occur while encoding or decoding events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event type, a
    /// missing field, or a field of the wrong type (e.g. a numeric `heroId`).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The event decoded but is not allowed where it appeared, such as a
    /// handshake with the wrong protocol version.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
