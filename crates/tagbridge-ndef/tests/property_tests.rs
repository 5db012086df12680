//! Property-based tests for record container encoding.
//!
//! These tests use proptest to generate payloads and tag capabilities and
//! verify that the container invariants hold for all of them.

use proptest::prelude::*;
use tagbridge_core::TagCapability;
use tagbridge_core::constants::{NTAG_CAPACITIES, NTAG216_CAPACITY};
use tagbridge_ndef::{EncoderConfig, LengthEncoding, NdefError, RecordEncoder, decode};

/// Strategy for generating capabilities of every known tag kind.
fn any_capability() -> impl Strategy<Value = TagCapability> {
    prop_oneof![
        Just(TagCapability::legacy()),
        prop::sample::select(NTAG_CAPACITIES.to_vec())
            .prop_map(|(code, _)| TagCapability::ntag(code, "4.2")),
    ]
}

/// Strategy for generating text of up to NTAG216 capacity in bytes.
fn any_text() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..NTAG216_CAPACITY / 4 + 1)
        .prop_map(|chars| chars.into_iter().collect())
}

fn extended() -> RecordEncoder {
    RecordEncoder::new(EncoderConfig::default()).unwrap()
}

proptest! {
    /// Property: every container is page aligned and decodes to its text.
    #[test]
    fn prop_container_aligned_and_roundtrips(
        text in any_text(),
        capability in any_capability(),
    ) {
        match extended().encode(&text, &capability) {
            Ok(container) => {
                prop_assert_eq!(container.len() % capability.bytes_per_page, 0);
                prop_assert_eq!(container.page_count() * capability.bytes_per_page, container.len());
                prop_assert!(container.len() - container.unpadded_len() < capability.bytes_per_page);
                prop_assert_eq!(container.payload_len(), text.len());

                let record = decode(container.as_bytes()).unwrap();
                prop_assert_eq!(record.text, text);
            }
            Err(NdefError::CapacityExceeded { size, capacity, .. }) => {
                prop_assert!(size > capacity);
                prop_assert_eq!(size, text.len());
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// Property: the capacity rule depends on byte length only.
    #[test]
    fn prop_capacity_rule(
        len in 0usize..1000,
        capability in any_capability(),
    ) {
        let text = "a".repeat(len);
        let result = extended().encode(&text, &capability);
        prop_assert_eq!(result.is_ok(), len <= capability.capacity_bytes);
    }

    /// Property: the short encoding never emits an extended TLV length.
    #[test]
    fn prop_short_encoding_single_length_byte(len in 0usize..300) {
        let encoder = RecordEncoder::new(EncoderConfig {
            length_encoding: LengthEncoding::Short,
            ..EncoderConfig::default()
        })
        .unwrap();

        let text = "b".repeat(len);
        match encoder.encode(&text, &TagCapability::ntag(0x13, "4.2")) {
            Ok(container) => {
                prop_assert!(container.as_bytes()[1] < 0xFF);
                prop_assert_eq!(container.as_bytes()[1] as usize, container.unpadded_len() - 3);
            }
            Err(NdefError::RecordTooLong { .. }) => prop_assert!(len > 247),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
