//! NDEF text record encoding for Type 2 tags.
//!
//! Turns application text into the bytes the paged writer puts on a tag: an
//! NDEF well-known text record, wrapped in an NDEF message TLV, closed by a
//! terminator TLV and zero-padded to the page size. [`decode`] reverses the
//! process for verification and read-back.

pub mod container;
pub mod error;
pub mod record;

pub use container::{EncoderConfig, LengthEncoding, RecordEncoder, TagRecordContainer, decode};
pub use error::{NdefError, Result};
pub use record::TextRecord;
