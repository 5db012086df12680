//! NDEF well-known text record (`urn:nfc:wkt:T`).
//!
//! # Layout
//!
//! ```text
//! ┌────────┬──────────┬────────────────┬──────┬────────┬──────────┬───────────┐
//! │ header │ type len │ payload length │ 'T'  │ status │ language │ UTF-8 text│
//! │ 1 byte │ 0x01     │ 1 (SR) or 4    │      │ 1 byte │ n bytes  │           │
//! └────────┴──────────┴────────────────┴──────┴────────┴──────────┴───────────┘
//! ```
//!
//! Header flags: MB (0x80) | ME (0x40) | SR (0x10) | TNF well-known (0x01),
//! i.e. `0xD1` for a single short record. The status byte carries the text
//! encoding in bit 7 (0 = UTF-8) and the language tag length in bits 0..5.

use crate::{NdefError, Result};
use bytes::{BufMut, BytesMut};

/// Message Begin flag.
pub const FLAG_MB: u8 = 0x80;
/// Message End flag.
pub const FLAG_ME: u8 = 0x40;
/// Chunk flag.
pub const FLAG_CF: u8 = 0x20;
/// Short Record flag (one-byte payload length).
pub const FLAG_SR: u8 = 0x10;
/// ID Length present flag.
pub const FLAG_IL: u8 = 0x08;
/// Mask of the Type Name Format bits.
pub const TNF_MASK: u8 = 0x07;
/// TNF: NFC Forum well-known type.
pub const TNF_WELL_KNOWN: u8 = 0x01;
/// Record type of a text record.
pub const TEXT_RECORD_TYPE: u8 = b'T';
/// Status bit selecting UTF-16 text.
pub const STATUS_UTF16: u8 = 0x80;
/// Mask of the language length bits in the status byte.
pub const LANGUAGE_LENGTH_MASK: u8 = 0x3F;

/// Longest payload a short record can describe.
pub const SHORT_RECORD_MAX_PAYLOAD: usize = 0xFF;

/// A decoded text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    /// ISO 639 language tag, e.g. `it`.
    pub language: String,

    /// Record text.
    pub text: String,
}

impl TextRecord {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
        }
    }
}

/// Check a language tag fits the six status-byte length bits.
pub(crate) fn validate_language(language: &str) -> Result<()> {
    if language.is_empty()
        || !language.is_ascii()
        || language.len() > LANGUAGE_LENGTH_MASK as usize
    {
        return Err(NdefError::InvalidLanguage(language.to_string()));
    }
    Ok(())
}

/// Serialize one text record into `buf`.
///
/// The short form (SR set, one-byte payload length) is used whenever the
/// payload fits; `force_short` turns an oversized payload into an error
/// instead of switching to the four-byte length.
pub(crate) fn write_text_record(
    buf: &mut BytesMut,
    language: &str,
    text: &[u8],
    force_short: bool,
) -> Result<()> {
    let payload_len = 1 + language.len() + text.len();
    let short = payload_len <= SHORT_RECORD_MAX_PAYLOAD;

    if !short && force_short {
        return Err(NdefError::RecordTooLong {
            length: payload_len,
            max: SHORT_RECORD_MAX_PAYLOAD,
        });
    }

    let mut header = FLAG_MB | FLAG_ME | TNF_WELL_KNOWN;
    if short {
        header |= FLAG_SR;
    }

    buf.reserve(7 + payload_len);
    buf.put_u8(header);
    buf.put_u8(1);
    if short {
        buf.put_u8(payload_len as u8);
    } else {
        buf.put_u32(payload_len as u32);
    }
    buf.put_u8(TEXT_RECORD_TYPE);
    // bit 7 clear: UTF-8
    buf.put_u8(language.len() as u8);
    buf.put_slice(language.as_bytes());
    buf.put_slice(text);
    Ok(())
}

/// Parse the first record of an NDEF message as a UTF-8 text record.
pub(crate) fn parse_text_record(message: &[u8]) -> Result<TextRecord> {
    let mut cursor = Cursor::new(message);

    let header = cursor.u8()?;
    if header & FLAG_CF != 0 {
        return Err(NdefError::Unsupported("chunked record".to_string()));
    }
    if header & TNF_MASK != TNF_WELL_KNOWN {
        return Err(NdefError::Unsupported(format!(
            "type name format {}",
            header & TNF_MASK
        )));
    }

    let type_len = cursor.u8()? as usize;
    let payload_len = if header & FLAG_SR != 0 {
        cursor.u8()? as usize
    } else {
        u32::from_be_bytes(cursor.array::<4>()?) as usize
    };
    let id_len = if header & FLAG_IL != 0 {
        cursor.u8()? as usize
    } else {
        0
    };

    let record_type = cursor.take(type_len)?;
    if record_type != [TEXT_RECORD_TYPE] {
        return Err(NdefError::Unsupported(format!(
            "record type {:02X?}",
            record_type
        )));
    }
    cursor.take(id_len)?;

    let payload = cursor.take(payload_len)?;
    let (&status, rest) = payload
        .split_first()
        .ok_or_else(|| NdefError::malformed("empty text payload"))?;
    if status & STATUS_UTF16 != 0 {
        return Err(NdefError::Unsupported("UTF-16 text".to_string()));
    }

    let language_len = (status & LANGUAGE_LENGTH_MASK) as usize;
    if language_len > rest.len() {
        return Err(NdefError::malformed(format!(
            "language length {language_len} exceeds payload"
        )));
    }
    let (language, text) = rest.split_at(language_len);

    Ok(TextRecord {
        language: String::from_utf8(language.to_vec())
            .map_err(|_| NdefError::malformed("language tag is not UTF-8"))?,
        text: String::from_utf8(text.to_vec())
            .map_err(|_| NdefError::malformed("text is not UTF-8"))?,
    })
}

/// Bounds-checked reader over a byte slice.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                NdefError::malformed(format!(
                    "need {len} bytes at offset {}, {} available",
                    self.pos,
                    self.data.len().saturating_sub(self.pos)
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn encode(language: &str, text: &str, force_short: bool) -> Result<Vec<u8>> {
        let mut buf = BytesMut::new();
        write_text_record(&mut buf, language, text.as_bytes(), force_short)?;
        Ok(buf.to_vec())
    }

    #[test]
    fn test_short_record_layout() {
        let bytes = encode("it", "hi", true).unwrap();
        assert_eq!(bytes, vec![0xD1, 0x01, 0x05, b'T', 0x02, b'i', b't', b'h', b'i']);
    }

    #[test]
    fn test_long_record_layout() {
        let text = "x".repeat(300);
        let bytes = encode("it", &text, false).unwrap();

        assert_eq!(bytes[0], 0xC1);
        assert_eq!(bytes[1], 0x01);
        assert_eq!(&bytes[2..6], &(303u32).to_be_bytes());
        assert_eq!(bytes[6], b'T');
        assert_eq!(bytes.len(), 7 + 303);
    }

    #[test]
    fn test_force_short_rejects_long_payload() {
        let text = "x".repeat(253);
        let err = encode("it", &text, true).unwrap_err();
        assert!(matches!(
            err,
            NdefError::RecordTooLong { length: 256, max: 255 }
        ));
    }

    #[rstest]
    #[case("")]
    #[case("français")]
    #[case(&"a".repeat(64))]
    fn test_invalid_language(#[case] language: &str) {
        assert!(validate_language(language).is_err());
    }

    #[rstest]
    #[case("it")]
    #[case("en-US")]
    fn test_valid_language(#[case] language: &str) {
        assert!(validate_language(language).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("{\"id\":\"x1\"}")]
    #[case("città ✓")]
    fn test_parse_roundtrip(#[case] text: &str) {
        let bytes = encode("it", text, false).unwrap();
        let record = parse_text_record(&bytes).unwrap();
        assert_eq!(record, TextRecord::new("it", text));
    }

    #[test]
    fn test_parse_rejects_utf16() {
        let bytes = vec![0xD1, 0x01, 0x03, b'T', 0x82, b'e', b'n'];
        assert!(matches!(
            parse_text_record(&bytes).unwrap_err(),
            NdefError::Unsupported(_)
        ));
    }

    #[test]
    fn test_parse_rejects_uri_record() {
        let bytes = vec![0xD1, 0x01, 0x02, b'U', 0x04, b'a'];
        assert!(matches!(
            parse_text_record(&bytes).unwrap_err(),
            NdefError::Unsupported(_)
        ));
    }

    #[test]
    fn test_parse_truncated() {
        let bytes = vec![0xD1, 0x01, 0x09, b'T', 0x02, b'i'];
        assert!(matches!(
            parse_text_record(&bytes).unwrap_err(),
            NdefError::Malformed(_)
        ));
    }
}
