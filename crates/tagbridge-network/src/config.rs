//! Bridge server configuration.

use tagbridge_core::constants::{DEFAULT_HOST, DEFAULT_PORT};

/// Greeting sent to every peer right after the handshake.
pub const CONNECTED_MESSAGE: &str = "NFC USB bridge connected";

/// Configuration for [`BridgeServer`](crate::BridgeServer).
///
/// # Example
///
/// ```
/// use tagbridge_network::BridgeConfig;
///
/// let config = BridgeConfig::with_address("127.0.0.1", 9000);
/// assert_eq!(config.bind_addr, "127.0.0.1:9000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// `host:port` to listen on; host names are resolved at bind time.
    pub bind_addr: String,

    /// Text of the `connected` greeting.
    pub connected_message: String,
}

impl BridgeConfig {
    pub fn with_address(host: &str, port: u16) -> Self {
        Self {
            bind_addr: format!("{host}:{port}"),
            connected_message: CONNECTED_MESSAGE.to_string(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::with_address(DEFAULT_HOST, DEFAULT_PORT)
    }
}
