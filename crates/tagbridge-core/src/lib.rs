//! Shared domain types for the tag bridge.
//!
//! Everything the hardware, record, writer and network crates need to agree
//! on lives here: reader command constants, tag capabilities, write results
//! and presence events.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
