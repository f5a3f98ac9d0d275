//! Fieldlink error types.
//!
//! Errors only surface from host-initiated calls (building the client,
//! connecting, sending reports, acknowledging delegated commands). Faults seen
//! while ticking the session are absorbed by the state machine: transport
//! faults become a `Disconnected` transition, malformed frames are logged and
//! dropped, and command faults turn into a `failed` acknowledgement.

use thiserror::Error;

/// Fieldlink errors.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// Transport-level failure (connect, send, close).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Frame could not be decoded into a protocol message, or an outbound
    /// message is not encodable.
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Frame carried a `type` the protocol does not define.
    #[error("Unknown message kind: {0}")]
    UnknownKind(String),

    /// Operation requires an authenticated session.
    #[error("Session not authenticated")]
    NotAuthenticated,

    /// Acknowledgement for a command id that is not outstanding.
    #[error("No outstanding command with id {0}")]
    UnknownCommand(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fieldlink operations
pub type Result<T> = std::result::Result<T, LinkError>;

impl From<toml::de::Error> for LinkError {
    fn from(err: toml::de::Error) -> Self {
        LinkError::Config(err.to_string())
    }
}

impl From<tungstenite::Error> for LinkError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Io(io) => LinkError::Io(io),
            other => LinkError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tungstenite_io_error_keeps_kind() {
        let err: LinkError = tungstenite::Error::Io(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "would block",
        ))
        .into();
        match err {
            LinkError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::WouldBlock),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_tungstenite_protocol_error_is_transport() {
        let err: LinkError = tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, LinkError::Transport(_)));
    }

    #[test]
    fn test_toml_error_is_config() {
        let err: LinkError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(matches!(err, LinkError::Config(_)));
    }
}
