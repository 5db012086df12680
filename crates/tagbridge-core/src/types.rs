use crate::{
    Result,
    constants::{
        BYTES_PER_PAGE, LEGACY_CAPACITY, NTAG_CAPACITIES, NTAG213_CAPACITY, START_PAGE,
    },
    error::Error,
};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag family as classified by the capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagKind {
    /// NTAG21x: answered GET VERSION with a storage size code.
    Ntag,

    /// Original MIFARE Ultralight: no GET VERSION support, assumed small.
    #[serde(rename = "MIFARE_UL")]
    MifareUltralight,

    /// Nothing could be classified.
    Unknown,
}

impl TagKind {
    /// Label used in logs and result messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ntag => "NTAG",
            Self::MifareUltralight => "MIFARE_UL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TagKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NTAG" => Ok(Self::Ntag),
            "MIFARE_UL" => Ok(Self::MifareUltralight),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(Error::UnknownTagKind(other.to_string())),
        }
    }
}

/// Storage type, capacity and page geometry of the tag in the field.
///
/// Computed fresh for every write attempt; the tag on the reader may have
/// changed since the previous call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCapability {
    pub kind: TagKind,
    pub version_label: String,
    pub storage_code: u8,
    pub capacity_bytes: usize,
    pub start_page: u8,
    pub bytes_per_page: usize,
}

impl TagCapability {
    /// Capability of an NTAG21x that reported `storage_code`.
    ///
    /// Codes missing from [`NTAG_CAPACITIES`] map to the smallest capacity.
    #[must_use]
    pub fn ntag(storage_code: u8, version_label: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Ntag,
            version_label: version_label.into(),
            storage_code,
            capacity_bytes: capacity_for_storage_code(storage_code),
            start_page: START_PAGE,
            bytes_per_page: BYTES_PER_PAGE,
        }
    }

    /// Conservative capability for tags that do not answer the version probe.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            kind: TagKind::MifareUltralight,
            version_label: "unknown".to_string(),
            storage_code: 0,
            capacity_bytes: LEGACY_CAPACITY,
            start_page: START_PAGE,
            bytes_per_page: BYTES_PER_PAGE,
        }
    }
}

/// Resolve an NTAG storage size code to user memory in bytes.
#[must_use]
pub fn capacity_for_storage_code(code: u8) -> usize {
    NTAG_CAPACITIES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, capacity)| *capacity)
        .unwrap_or(NTAG213_CAPACITY)
}

/// Tag identifier formatted as colon-separated uppercase hex (`04:A1:B2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSerial(String);

impl TagSerial {
    /// Format raw identifier bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` for an empty identifier.
    pub fn from_bytes(uid: &[u8]) -> Result<Self> {
        if uid.is_empty() {
            return Err(Error::InvalidIdentifier("empty UID".to_string()));
        }
        let formatted = uid
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        Ok(Self(formatted))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reader as listed to peers: `{name, index}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderDescriptor {
    pub name: String,
    pub index: usize,
}

impl ReaderDescriptor {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// Outcome of one write request.
///
/// Every failure is folded into a result with `success == false`; the
/// correlation id always travels back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub success: bool,
    pub message: String,
    /// Logical payload length (text bytes, no record overhead or padding).
    pub bytes_written: usize,
    pub pages_written: usize,
    pub tag_kind: TagKind,
    pub tag_capacity: usize,
    pub correlation_id: Option<String>,
}

impl WriteResult {
    #[must_use]
    pub fn success(
        capability: &TagCapability,
        bytes_written: usize,
        pages_written: usize,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            success: true,
            message: format!("Tag {} written ({} bytes)", capability.kind, bytes_written),
            bytes_written,
            pages_written,
            tag_kind: capability.kind,
            tag_capacity: capability.capacity_bytes,
            correlation_id,
        }
    }

    /// Failure result. `capability` is `None` when detection never ran.
    #[must_use]
    pub fn failure(
        cause: impl fmt::Display,
        capability: Option<&TagCapability>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            success: false,
            message: format!("Error: {cause}"),
            bytes_written: 0,
            pages_written: 0,
            tag_kind: capability.map_or(TagKind::Unknown, |c| c.kind),
            tag_capacity: capability.map_or(0, |c| c.capacity_bytes),
            correlation_id,
        }
    }
}

/// Presence transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKind {
    Detected,
    Removed,
}

/// One tag insertion or removal, emitted exactly once per transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub kind: PresenceKind,
    /// Known on insertion only.
    pub serial_number: Option<TagSerial>,
    pub timestamp: DateTime<Local>,
    pub reader: Option<String>,
}

impl PresenceEvent {
    #[must_use]
    pub fn detected(serial_number: TagSerial, reader: impl Into<String>) -> Self {
        Self {
            kind: PresenceKind::Detected,
            serial_number: Some(serial_number),
            timestamp: Local::now(),
            reader: Some(reader.into()),
        }
    }

    #[must_use]
    pub fn removed() -> Self {
        Self {
            kind: PresenceKind::Removed,
            serial_number: None,
            timestamp: Local::now(),
            reader: None,
        }
    }
}
