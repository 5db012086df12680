//! Error types for tag detection and writing.

use tagbridge_hardware::HardwareError;
use tagbridge_ndef::NdefError;

/// Result type alias for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Errors that end a write attempt.
///
/// The orchestrator folds every one of these into a failed
/// [`WriteResult`](tagbridge_core::WriteResult); they never reach the peer
/// as faults.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// No reader is attached.
    #[error("No NFC reader found")]
    NoReader,

    /// Reader enumeration or session setup failed.
    #[error("Reader error: {0}")]
    Reader(#[source] HardwareError),

    /// Payload rejected before any write (capacity, length encoding, serialization).
    #[error(transparent)]
    Record(#[from] NdefError),

    /// The tag answered a page write with a non-success status.
    #[error("Error writing page {page}: {sw1:02X} {sw2:02X}")]
    PageWriteFailed { page: u8, sw1: u8, sw2: u8 },

    /// The exchange for a page write failed outright.
    #[error("Error writing page {page}: {source}")]
    Transport {
        page: u8,
        #[source]
        source: HardwareError,
    },

    /// Buffer length is not a whole number of pages.
    #[error("Buffer of {len} bytes is not a multiple of the {page_size}-byte page")]
    MisalignedBuffer { len: usize, page_size: usize },

    /// The buffer runs past the last addressable page.
    #[error("Page {page} is beyond the addressable range")]
    PageOutOfRange { page: usize },
}

impl From<HardwareError> for WriteError {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::NoReader => Self::NoReader,
            other => Self::Reader(other),
        }
    }
}
