//! Crate-level error type

/// Errors surfaced by the relay
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// WebSocket protocol failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// Client did not complete the WebSocket handshake in time
    #[error("Handshake timed out")]
    HandshakeTimeout,
    /// No inbound traffic within the idle timeout
    #[error("Connection idle timeout")]
    IdleTimeout,
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
