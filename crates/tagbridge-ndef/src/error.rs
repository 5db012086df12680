//! Error types for record encoding and decoding.

use tagbridge_core::TagKind;
use thiserror::Error;

/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, NdefError>;

/// Errors produced while building or parsing a tag record container.
#[derive(Debug, Error)]
pub enum NdefError {
    /// Payload is larger than the detected tag can hold.
    #[error("Payload too large ({size} bytes) for tag {kind} (capacity: {capacity} bytes)")]
    CapacityExceeded {
        kind: TagKind,
        size: usize,
        capacity: usize,
    },

    /// Record does not fit the single-byte TLV length of the short encoding.
    #[error("Record of {length} bytes exceeds the {max}-byte short TLV length")]
    RecordTooLong { length: usize, max: usize },

    /// Language tag is empty, non-ASCII or longer than 63 bytes.
    #[error("Invalid language tag: {0:?}")]
    InvalidLanguage(String),

    /// Payload could not be serialized to text.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No NDEF message TLV before the terminator or end of data.
    #[error("No NDEF message found")]
    NoMessage,

    /// Structural error while parsing.
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// Valid NDEF, but not a UTF-8 text record.
    #[error("Unsupported record: {0}")]
    Unsupported(String),
}

impl NdefError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
