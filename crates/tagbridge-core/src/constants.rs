//! Reader command set and tag geometry constants.
//!
//! The bridge talks to PC/SC readers through pseudo-APDUs: the reader
//! firmware intercepts the `FF` class byte and forwards the embedded
//! operation to the tag in the field. Every response ends with a two-byte
//! status word; only `90 00` means success.
//!
//! # Command Layout
//!
//! | Command | Bytes | Purpose |
//! |---------|-------|---------|
//! | GET VERSION | `FF 00 00 00 01 60` | NTAG21x version probe (direct transmit) |
//! | GET UID | `FF CA 00 00 00` | Read the tag identifier |
//! | UPDATE BINARY | `FF D6 00 <page> <len> <data..>` | Write one page |
//!
//! # Usage
//!
//! ```
//! use tagbridge_core::constants::*;
//!
//! let apdu = write_page_command(4, &[0x03, 0x10, 0xD1, 0x01]);
//! assert_eq!(&apdu[..5], &[0xFF, 0xD6, 0x00, 0x04, 0x04]);
//! assert_eq!(apdu.len(), 5 + BYTES_PER_PAGE);
//! ```

// ============================================================================
// Status Words
// ============================================================================

/// First status byte of a successful exchange.
pub const SW1_SUCCESS: u8 = 0x90;

/// Second status byte of a successful exchange.
pub const SW2_SUCCESS: u8 = 0x00;

// ============================================================================
// Reader Commands
// ============================================================================

/// GET VERSION wrapped in a direct-transmit pseudo-APDU.
///
/// NTAG21x and Ultralight EV1 tags answer with 8 bytes; byte 6 is the
/// storage size code. Original Ultralight tags do not implement it.
pub const GET_VERSION: [u8; 6] = [0xFF, 0x00, 0x00, 0x00, 0x01, 0x60];

/// GET DATA (UID) with `Le = 00` (return the full identifier).
pub const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Class and instruction bytes of UPDATE BINARY.
pub const WRITE_PAGE_HEADER: [u8; 3] = [0xFF, 0xD6, 0x00];

/// Minimum GET VERSION payload that carries a storage size code.
pub const VERSION_RESPONSE_MIN_LEN: usize = 7;

/// Offset of the storage size code inside the GET VERSION payload.
pub const STORAGE_CODE_OFFSET: usize = 6;

/// Build an UPDATE BINARY command for one page.
pub fn write_page_command(page: u8, data: &[u8]) -> Vec<u8> {
    let mut apdu = Vec::with_capacity(WRITE_PAGE_HEADER.len() + 2 + data.len());
    apdu.extend_from_slice(&WRITE_PAGE_HEADER);
    apdu.push(page);
    apdu.push(data.len() as u8);
    apdu.extend_from_slice(data);
    apdu
}

// ============================================================================
// Tag Geometry
// ============================================================================

/// First user-memory page on Type 2 tags (pages 0-3 hold UID, lock and CC).
pub const START_PAGE: u8 = 4;

/// Bytes per page on Type 2 tags.
pub const BYTES_PER_PAGE: usize = 4;

/// NTAG213 storage size code.
pub const STORAGE_CODE_NTAG213: u8 = 0x0F;

/// NTAG215 storage size code.
pub const STORAGE_CODE_NTAG215: u8 = 0x11;

/// NTAG216 storage size code.
pub const STORAGE_CODE_NTAG216: u8 = 0x13;

/// NTAG213 user memory in bytes.
pub const NTAG213_CAPACITY: usize = 144;

/// NTAG215 user memory in bytes.
pub const NTAG215_CAPACITY: usize = 504;

/// NTAG216 user memory in bytes.
pub const NTAG216_CAPACITY: usize = 888;

/// Capacity assumed for tags that do not answer GET VERSION.
pub const LEGACY_CAPACITY: usize = 48;

/// Known storage size codes and their user memory.
///
/// Unknown codes resolve to the smallest entry so a misdetected tag is never
/// written past its real end.
pub const NTAG_CAPACITIES: [(u8, usize); 3] = [
    (STORAGE_CODE_NTAG213, NTAG213_CAPACITY),
    (STORAGE_CODE_NTAG215, NTAG215_CAPACITY),
    (STORAGE_CODE_NTAG216, NTAG216_CAPACITY),
];

// ============================================================================
// Bridge Defaults
// ============================================================================

/// Default WebSocket host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default WebSocket port.
pub const DEFAULT_PORT: u16 = 8765;

/// Default NDEF text record language (ISO 639-1).
pub const DEFAULT_LANGUAGE: &str = "it";
