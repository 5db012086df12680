//! WebSocket bridge for the tag reader.
//!
//! Browser peers connect over WebSocket (default `ws://localhost:8765`),
//! receive tag presence events as they happen, and ask for tags to be
//! written. See [`message`] for the wire format.
//!
//! # Components
//!
//! - [`BridgeServer`]: accept loop, per-peer command handling, presence relay
//! - [`hub`]: the single task owning the peer set and fanning out broadcasts
//! - [`BridgeConfig`]: listen address and greeting

mod config;
mod error;
pub mod hub;
pub mod message;
mod server;

pub use config::{BridgeConfig, CONNECTED_MESSAGE};
pub use error::{BridgeError, Result};
pub use hub::{HubHandle, PeerId};
pub use message::{ClientMessage, ServerMessage};
pub use server::BridgeServer;
