//! Tag capability detection.
//!
//! A two-branch decision:
//!
//! | Probe result | Outcome | Capability |
//! |--------------|---------|------------|
//! | `90 00` with at least 7 bytes | [`ProbeOutcome::Recognized`] | NTAG, capacity from the storage code (unknown codes → smallest) |
//! | anything else | [`ProbeOutcome::Fallback`] | MIFARE Ultralight, 48 bytes |
//!
//! Detection never fails; the fallback branch is always logged at warning
//! level so it cannot pass for a successful probe.

use std::fmt;
use tagbridge_core::TagCapability;
use tagbridge_core::constants::{GET_VERSION, STORAGE_CODE_OFFSET, VERSION_RESPONSE_MIN_LEN};
use tagbridge_hardware::TagSession;
use tracing::{debug, warn};

/// Why the version probe did not classify the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The exchange itself failed.
    Transport(String),

    /// The tag answered with a non-success status.
    Status { sw1: u8, sw2: u8 },

    /// Success status, but too few bytes to hold a storage code.
    ShortResponse { len: usize },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Status { sw1, sw2 } => write!(f, "status {sw1:02X} {sw2:02X}"),
            Self::ShortResponse { len } => write!(f, "response of {len} bytes"),
        }
    }
}

/// Result of the version probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// GET VERSION answered; the tag is an NTAG21x.
    Recognized(TagCapability),

    /// GET VERSION unavailable; conservative legacy capability.
    Fallback {
        reason: FallbackReason,
        capability: TagCapability,
    },
}

impl ProbeOutcome {
    pub fn capability(&self) -> &TagCapability {
        match self {
            Self::Recognized(capability) => capability,
            Self::Fallback { capability, .. } => capability,
        }
    }

    pub fn into_capability(self) -> TagCapability {
        match self {
            Self::Recognized(capability) => capability,
            Self::Fallback { capability, .. } => capability,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Send GET VERSION and classify the answer.
pub fn probe<S: TagSession>(session: &mut S) -> ProbeOutcome {
    let reason = match session.transmit(&GET_VERSION) {
        Ok(response) if !response.is_success() => FallbackReason::Status {
            sw1: response.sw1,
            sw2: response.sw2,
        },
        Ok(response) if response.data.len() < VERSION_RESPONSE_MIN_LEN => {
            FallbackReason::ShortResponse {
                len: response.data.len(),
            }
        }
        Ok(response) => {
            let data = &response.data;
            let version = format!("{}.{}", data[2], data[3]);
            let capability = TagCapability::ntag(data[STORAGE_CODE_OFFSET], version);
            debug!(
                storage_code = format_args!("{:#04X}", capability.storage_code),
                capacity = capability.capacity_bytes,
                "GET VERSION answered"
            );
            return ProbeOutcome::Recognized(capability);
        }
        Err(e) => FallbackReason::Transport(e.to_string()),
    };

    ProbeOutcome::Fallback {
        reason,
        capability: TagCapability::legacy(),
    }
}

/// Detect the capability of the tag behind `session`.
///
/// # Examples
///
/// ```
/// use tagbridge_hardware::mock::{MockTag, MockTransport};
/// use tagbridge_hardware::ReaderTransport;
/// use tagbridge_rfid::detector::detect;
/// use tagbridge_core::TagKind;
///
/// let (transport, handle) = MockTransport::with_reader("Reader 0");
/// handle.place_tag("Reader 0", MockTag::ultralight(vec![1, 2, 3, 4])).unwrap();
///
/// let mut session = transport.connect("Reader 0").unwrap();
/// let capability = detect(&mut session);
/// assert_eq!(capability.kind, TagKind::MifareUltralight);
/// assert_eq!(capability.capacity_bytes, 48);
/// ```
pub fn detect<S: TagSession>(session: &mut S) -> TagCapability {
    let outcome = probe(session);
    if let ProbeOutcome::Fallback { reason, .. } = &outcome {
        warn!(%reason, "GET VERSION failed - assuming classic MIFARE Ultralight");
    }
    outcome.into_capability()
}
