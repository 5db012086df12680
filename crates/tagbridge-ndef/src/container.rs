//! TLV container and the record encoder.
//!
//! Type 2 tags store the NDEF message inside a TLV block in user memory:
//!
//! ```text
//! 03 <len> <NDEF message ...> FE 00 00 ..
//! ^^ ^^^^^                    ^^ ^^^^^^^^
//! │  │                        │  padding to the page boundary
//! │  │                        terminator TLV
//! │  1 byte, or FF hi lo for messages of 255 bytes and more
//! NDEF message TLV
//! ```
//!
//! # Length encoding
//!
//! A single TLV length byte combined with an always-short record caps a
//! container at 255 bytes, even on NTAG215/216. [`LengthEncoding::Short`]
//! keeps that layout (and reports [`NdefError::RecordTooLong`] past the
//! cap); [`LengthEncoding::Extended`] follows the NFC Forum Type 2 rules so
//! the whole detected capacity is usable. Records below the cap are
//! byte-identical in both modes.

use crate::record::{self, TextRecord};
use crate::{NdefError, Result};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tagbridge_core::TagCapability;
use tagbridge_core::constants::DEFAULT_LANGUAGE;

/// TLV type of an NDEF message.
pub const TLV_NDEF_MESSAGE: u8 = 0x03;
/// TLV type of the terminator.
pub const TLV_TERMINATOR: u8 = 0xFE;
/// TLV type of padding bytes.
pub const TLV_NULL: u8 = 0x00;
/// First length byte announcing the three-byte length format.
pub const TLV_LENGTH_EXTENDED: u8 = 0xFF;
/// Largest length the one-byte format can hold.
pub const TLV_SHORT_MAX: usize = 0xFE;

/// How the TLV and record lengths are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthEncoding {
    /// One length byte everywhere; containers are capped at 254 record bytes.
    Short,

    /// Three-byte TLV length and four-byte record payload length when needed.
    #[default]
    Extended,
}

/// Record encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Language tag written in every text record.
    pub language: String,

    /// Length field format.
    pub length_encoding: LengthEncoding,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            length_encoding: LengthEncoding::default(),
        }
    }
}

/// Page-aligned bytes ready to be written from the tag's start page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecordContainer {
    bytes: Vec<u8>,
    unpadded_len: usize,
    payload_len: usize,
    bytes_per_page: usize,
}

impl TagRecordContainer {
    /// Padded container bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Padded length; always a multiple of the page size.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Length up to and including the terminator.
    pub fn unpadded_len(&self) -> usize {
        self.unpadded_len
    }

    /// Logical payload length: the text bytes alone.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    pub fn bytes_per_page(&self) -> usize {
        self.bytes_per_page
    }

    /// Number of pages the container occupies.
    pub fn page_count(&self) -> usize {
        self.bytes.len() / self.bytes_per_page
    }

    /// Page-sized chunks in write order.
    pub fn pages(&self) -> std::slice::Chunks<'_, u8> {
        self.bytes.chunks(self.bytes_per_page)
    }
}

/// Builds tag record containers.
///
/// # Examples
///
/// ```
/// use tagbridge_core::TagCapability;
/// use tagbridge_ndef::{EncoderConfig, RecordEncoder};
///
/// let encoder = RecordEncoder::new(EncoderConfig::default()).unwrap();
/// let capability = TagCapability::ntag(0x0F, "4.2");
///
/// let container = encoder.encode_json(&serde_json::json!({"id": "x1"}), &capability).unwrap();
/// assert_eq!(container.payload_len(), 11);
/// assert_eq!(container.len() % 4, 0);
/// assert_eq!(&container.as_bytes()[..2], &[0x03, 0x12]);
/// ```
#[derive(Debug, Clone)]
pub struct RecordEncoder {
    config: EncoderConfig,
}

impl RecordEncoder {
    /// Create an encoder.
    ///
    /// # Errors
    ///
    /// Returns [`NdefError::InvalidLanguage`] if the language tag is empty,
    /// non-ASCII or longer than 63 bytes.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        record::validate_language(&config.language)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Serialize `value` to compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`NdefError::Serialization`] if the value cannot be serialized.
    pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Serialize `value` and encode it for `capability`.
    ///
    /// # Errors
    ///
    /// See [`encode`](Self::encode).
    pub fn encode_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        capability: &TagCapability,
    ) -> Result<TagRecordContainer> {
        self.encode(&Self::serialize(value)?, capability)
    }

    /// Fail with [`NdefError::CapacityExceeded`] if `text` does not fit.
    ///
    /// Only the text bytes count; record overhead and padding do not.
    ///
    /// # Errors
    ///
    /// Returns [`NdefError::CapacityExceeded`] naming the tag kind and both sizes.
    pub fn check_capacity(text: &str, capability: &TagCapability) -> Result<()> {
        if text.len() > capability.capacity_bytes {
            return Err(NdefError::CapacityExceeded {
                kind: capability.kind,
                size: text.len(),
                capacity: capability.capacity_bytes,
            });
        }
        Ok(())
    }

    /// Encode `text` into a padded container for `capability`.
    ///
    /// # Errors
    ///
    /// - [`NdefError::CapacityExceeded`] if `text` is longer than the tag's
    ///   capacity; checked before anything is built.
    /// - [`NdefError::RecordTooLong`] if the short length encoding cannot
    ///   describe the record.
    pub fn encode(&self, text: &str, capability: &TagCapability) -> Result<TagRecordContainer> {
        Self::check_capacity(text, capability)?;
        let text = text.as_bytes();

        let short = self.config.length_encoding == LengthEncoding::Short;
        let mut message = BytesMut::new();
        record::write_text_record(&mut message, &self.config.language, text, short)?;

        if short && message.len() > TLV_SHORT_MAX {
            return Err(NdefError::RecordTooLong {
                length: message.len(),
                max: TLV_SHORT_MAX,
            });
        }

        let bytes_per_page = capability.bytes_per_page.max(1);
        let mut buf = BytesMut::with_capacity(message.len() + 5 + bytes_per_page);
        buf.put_u8(TLV_NDEF_MESSAGE);
        if message.len() <= TLV_SHORT_MAX {
            buf.put_u8(message.len() as u8);
        } else {
            buf.put_u8(TLV_LENGTH_EXTENDED);
            buf.put_u16(message.len() as u16);
        }
        buf.put_slice(&message);
        buf.put_u8(TLV_TERMINATOR);

        let unpadded_len = buf.len();
        let padding = (bytes_per_page - unpadded_len % bytes_per_page) % bytes_per_page;
        buf.put_bytes(0, padding);

        Ok(TagRecordContainer {
            bytes: buf.to_vec(),
            unpadded_len,
            payload_len: text.len(),
            bytes_per_page,
        })
    }
}

/// Decode the first NDEF text record from a Type 2 TLV area.
///
/// NULL TLVs are skipped, lock/memory control TLVs are stepped over, and
/// the search stops at the terminator.
///
/// # Errors
///
/// Returns [`NdefError::NoMessage`] if no NDEF TLV precedes the terminator,
/// or a parse error for a malformed or non-text record.
///
/// # Examples
///
/// ```
/// use tagbridge_core::TagCapability;
/// use tagbridge_ndef::{decode, EncoderConfig, RecordEncoder};
///
/// let encoder = RecordEncoder::new(EncoderConfig::default()).unwrap();
/// let container = encoder.encode("hello", &TagCapability::legacy()).unwrap();
///
/// let record = decode(container.as_bytes()).unwrap();
/// assert_eq!(record.text, "hello");
/// assert_eq!(record.language, "it");
/// ```
pub fn decode(area: &[u8]) -> Result<TextRecord> {
    let mut cursor = record::Cursor::new(area);

    while !cursor.is_empty() {
        let tlv_type = cursor.u8()?;
        match tlv_type {
            TLV_NULL => continue,
            TLV_TERMINATOR => break,
            _ => {}
        }

        let length = match cursor.u8()? {
            TLV_LENGTH_EXTENDED => u16::from_be_bytes(cursor.array::<2>()?) as usize,
            short => short as usize,
        };
        let value = cursor.take(length)?;

        if tlv_type == TLV_NDEF_MESSAGE {
            return record::parse_text_record(value);
        }
    }

    Err(NdefError::NoMessage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tagbridge_core::{TagKind, constants::LEGACY_CAPACITY};

    fn encoder(length_encoding: LengthEncoding) -> RecordEncoder {
        RecordEncoder::new(EncoderConfig {
            language: "it".to_string(),
            length_encoding,
        })
        .unwrap()
    }

    #[test]
    fn test_small_container_layout() {
        let container = encoder(LengthEncoding::Extended)
            .encode("{\"id\":\"x1\"}", &TagCapability::ntag(0x0F, "4.2"))
            .unwrap();

        let bytes = container.as_bytes();
        assert_eq!(bytes[0], TLV_NDEF_MESSAGE);
        assert_eq!(bytes[1] as usize, 7 + 11);
        assert_eq!(&bytes[2..9], &[0xD1, 0x01, 14, b'T', 0x02, b'i', b't']);
        assert_eq!(&bytes[9..20], b"{\"id\":\"x1\"}");
        assert_eq!(bytes[20], TLV_TERMINATOR);

        assert_eq!(container.unpadded_len(), 21);
        assert_eq!(container.len(), 24);
        assert_eq!(&bytes[21..], &[0, 0, 0]);
        assert_eq!(container.page_count(), 6);
        assert_eq!(container.payload_len(), 11);
    }

    #[test]
    fn test_empty_text_is_valid() {
        let container = encoder(LengthEncoding::Short)
            .encode("", &TagCapability::legacy())
            .unwrap();

        assert_eq!(container.payload_len(), 0);
        assert_eq!(container.unpadded_len(), 10);
        assert_eq!(container.len(), 12);
        assert_eq!(decode(container.as_bytes()).unwrap().text, "");
    }

    #[test]
    fn test_capacity_exceeded_names_kind_and_sizes() {
        let text = "x".repeat(LEGACY_CAPACITY + 1);
        let err = encoder(LengthEncoding::Extended)
            .encode(&text, &TagCapability::legacy())
            .unwrap_err();

        match err {
            NdefError::CapacityExceeded {
                kind,
                size,
                capacity,
            } => {
                assert_eq!(kind, TagKind::MifareUltralight);
                assert_eq!(size, 49);
                assert_eq!(capacity, 48);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_capacity_boundary_is_inclusive() {
        let text = "x".repeat(LEGACY_CAPACITY);
        assert!(
            encoder(LengthEncoding::Short)
                .encode(&text, &TagCapability::legacy())
                .is_ok()
        );
    }

    #[test]
    fn test_extended_tlv_length_for_large_record() {
        let text = "y".repeat(500);
        let container = encoder(LengthEncoding::Extended)
            .encode(&text, &TagCapability::ntag(0x11, "4.2"))
            .unwrap();

        let bytes = container.as_bytes();
        let record_len = 7 + 3 + 500;
        assert_eq!(bytes[1], TLV_LENGTH_EXTENDED);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, record_len);
        assert_eq!(container.unpadded_len(), 4 + record_len + 1);
        assert_eq!(decode(bytes).unwrap().text, text);
    }

    #[test]
    fn test_short_encoding_caps_record() {
        // 7 bytes of record overhead + 248 = 255 > 254
        let text = "z".repeat(248);
        let err = encoder(LengthEncoding::Short)
            .encode(&text, &TagCapability::ntag(0x11, "4.2"))
            .unwrap_err();
        assert!(matches!(err, NdefError::RecordTooLong { length: 255, max: 254 }));

        let fits = "z".repeat(247);
        assert!(
            encoder(LengthEncoding::Short)
                .encode(&fits, &TagCapability::ntag(0x11, "4.2"))
                .is_ok()
        );
    }

    #[rstest]
    #[case(0)]
    #[case(100)]
    #[case(247)]
    fn test_encodings_agree_below_cap(#[case] size: usize) {
        let text = "q".repeat(size);
        let capability = TagCapability::ntag(0x13, "4.2");
        let short = encoder(LengthEncoding::Short).encode(&text, &capability).unwrap();
        let extended = encoder(LengthEncoding::Extended)
            .encode(&text, &capability)
            .unwrap();
        assert_eq!(short, extended);
    }

    #[test]
    fn test_invalid_language_rejected() {
        let config = EncoderConfig {
            language: String::new(),
            ..EncoderConfig::default()
        };
        assert!(matches!(
            RecordEncoder::new(config).unwrap_err(),
            NdefError::InvalidLanguage(_)
        ));
    }

    #[test]
    fn test_decode_skips_null_and_control_tlvs() {
        let container = encoder(LengthEncoding::Extended)
            .encode("abc", &TagCapability::legacy())
            .unwrap();

        // NULL, then a lock control TLV, then the message
        let mut area = vec![TLV_NULL, 0x01, 0x03, 0xA0, 0x0C, 0x34];
        area.extend_from_slice(container.as_bytes());
        assert_eq!(decode(&area).unwrap().text, "abc");
    }

    #[test]
    fn test_decode_empty_area() {
        assert!(matches!(decode(&[]).unwrap_err(), NdefError::NoMessage));
        assert!(matches!(
            decode(&[TLV_TERMINATOR, 0x03, 0x00]).unwrap_err(),
            NdefError::NoMessage
        ));
        assert!(matches!(decode(&[0; 16]).unwrap_err(), NdefError::NoMessage));
    }

    #[test]
    fn test_pages_chunking() {
        let container = encoder(LengthEncoding::Extended)
            .encode("0123456789", &TagCapability::legacy())
            .unwrap();
        let pages: Vec<&[u8]> = container.pages().collect();
        assert_eq!(pages.len(), container.page_count());
        assert!(pages.iter().all(|p| p.len() == 4));
    }
}
