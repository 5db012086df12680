//! Mock transport for testing and development.
//!
//! This module provides a simulated reader transport that can be controlled
//! programmatically without requiring physical hardware.

pub mod transport;

// Re-export commonly used types
pub use transport::{MockSession, MockTag, MockTransport, MockTransportHandle};
