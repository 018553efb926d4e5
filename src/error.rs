//! Error types for Mission Control

use thiserror::Error;

/// Result type alias using Mission Control's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Mission Control
///
/// Every variant renders as text an operator can read as-is; the console
/// shows these messages verbatim in its status area.
#[derive(Error, Debug)]
pub enum Error {
    /// Socket-level failure (DNS, TLS, refused connection, dropped socket)
    #[error("{0}")]
    Transport(String),

    /// Server answered the connect call with `ok = false`
    #[error("{0}")]
    HandshakeRejected(String),

    /// Handshake did not finish within the connection deadline
    #[error("WebSocket connection timeout")]
    HandshakeTimeout,

    /// Request issued before (or without) a successful handshake
    #[error("Gateway websocket not connected")]
    NotConnected,

    /// No response arrived before the request deadline
    #[error("Request timeout: {method}")]
    RequestTimeout {
        /// Method of the request that timed out
        method: String,
    },

    /// Server answered an application request with `ok = false`
    #[error("{0}")]
    RequestRejected(String),

    /// Inbound frame did not decode as a gateway envelope
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Client was closed while the call was outstanding
    #[error("Client closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Check if error came from a deadline expiring
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::HandshakeTimeout | Error::RequestTimeout { .. })
    }

    /// Check if error means the connection is gone or never came up
    ///
    /// Callers should drop the client and build a new one.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::HandshakeRejected(_)
                | Error::HandshakeTimeout
                | Error::NotConnected
                | Error::Closed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(format!("WebSocket error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_verbatim() {
        assert_eq!(Error::NotConnected.to_string(), "Gateway websocket not connected");
        assert_eq!(Error::Closed.to_string(), "Client closed");
        assert_eq!(
            Error::RequestTimeout { method: "status".to_string() }.to_string(),
            "Request timeout: status"
        );
        assert_eq!(
            Error::RequestRejected("bad scope (requestId: r1)".to_string()).to_string(),
            "bad scope (requestId: r1)"
        );
    }

    #[test]
    fn test_classification() {
        assert!(Error::HandshakeTimeout.is_timeout());
        assert!(Error::HandshakeTimeout.is_connection_error());
        assert!(!Error::RequestRejected("nope".into()).is_connection_error());
        assert!(Error::RequestTimeout { method: "health".into() }.is_timeout());
    }
}
