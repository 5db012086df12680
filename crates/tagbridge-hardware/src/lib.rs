//! Reader transport layer for the tag bridge.
//!
//! This crate abstracts the contactless reader the bridge talks to: reader
//! enumeration, command/response sessions and the insertion/removal event
//! source. On top of it sits the [`PresenceMonitor`], which turns raw
//! transitions into [`PresenceEvent`](tagbridge_core::PresenceEvent)s.
//!
//! # Transports
//!
//! - [`mock::MockTransport`]: simulated readers and Type 2 tags with page
//!   memory, for development and tests.
//! - `pcsc_transport::PcscTransport` (feature `hardware-pcsc`): any PC/SC
//!   reader through the system smart card service.
//! - [`devices::AnyTransport`]: enum dispatch over the above.
//!
//! # Sessions
//!
//! ```no_run
//! use tagbridge_hardware::{ReaderTransport, TagSession, Result};
//! use tagbridge_core::constants::GET_UID;
//!
//! fn read_uid<T: ReaderTransport>(transport: &T) -> Result<Vec<u8>> {
//!     let reader = transport.reader_at(0)?;
//!     let mut session = transport.connect(&reader.name)?;
//!     Ok(session.transmit(&GET_UID)?.data)
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] which uses the
//! [`HardwareError`] error type.
//!
//! # Thread Safety
//!
//! Transports are `Send + Sync` and sessions are `Send`, so both can be
//! shared with Tokio tasks and moved to the blocking pool.

pub mod devices;
pub mod error;
pub mod mock;
pub mod monitor;
#[cfg(feature = "hardware-pcsc")]
pub mod pcsc_transport;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{ReaderTransport, TagEventStream, TagSession};
pub use types::{ApduResponse, TagEventBatch, TagHandle};

// Re-export monitor types
pub use monitor::{MonitorTask, PresenceHandle, PresenceMonitor};
