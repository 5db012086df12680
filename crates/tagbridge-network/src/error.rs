//! Bridge server errors.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while serving peers.
///
/// Only [`BindFailed`](Self::BindFailed) ends the process; the rest are
/// scoped to one connection.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Failed to bind the listening socket.
    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// WebSocket handshake or frame error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Outgoing message could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The hub task is gone.
    #[error("Bridge hub stopped")]
    HubClosed,

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn bind_failed(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::BindFailed {
            addr: addr.into(),
            source,
        }
    }
}
