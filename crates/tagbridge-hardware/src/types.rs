//! Data types exchanged with a reader transport.
//!
//! Command responses, tag handles and the batched insertion/removal
//! notifications delivered by a transport's event source.

use crate::{HardwareError, Result};
use serde::{Deserialize, Serialize};
use tagbridge_core::constants::{SW1_SUCCESS, SW2_SUCCESS};

/// Response to one command exchange: payload plus status word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApduResponse {
    /// Response payload without the status word.
    pub data: Vec<u8>,

    /// First status byte.
    pub sw1: u8,

    /// Second status byte.
    pub sw2: u8,
}

impl ApduResponse {
    /// Create a response from its parts.
    pub fn new(data: Vec<u8>, sw1: u8, sw2: u8) -> Self {
        Self { data, sw1, sw2 }
    }

    /// A `90 00` response carrying `data`.
    pub fn ok(data: Vec<u8>) -> Self {
        Self::new(data, SW1_SUCCESS, SW2_SUCCESS)
    }

    /// A payload-less response with the given status word.
    pub fn status(sw1: u8, sw2: u8) -> Self {
        Self::new(Vec::new(), sw1, sw2)
    }

    /// Split a raw reader response into payload and status word.
    ///
    /// # Errors
    ///
    /// Returns an error if the response is shorter than the two status bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagbridge_hardware::ApduResponse;
    ///
    /// let response = ApduResponse::from_raw(&[0x04, 0xA1, 0x90, 0x00]).unwrap();
    /// assert_eq!(response.data, vec![0x04, 0xA1]);
    /// assert!(response.is_success());
    /// ```
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(HardwareError::malformed(format!(
                "Response of {} bytes has no status word",
                raw.len()
            )));
        }
        let (data, status) = raw.split_at(raw.len() - 2);
        Ok(Self::new(data.to_vec(), status[0], status[1]))
    }

    /// `true` only for status `90 00`.
    pub fn is_success(&self) -> bool {
        self.sw1 == SW1_SUCCESS && self.sw2 == SW2_SUCCESS
    }

    /// Status word formatted as `XX XX`.
    pub fn status_hex(&self) -> String {
        format!("{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// A tag seen by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagHandle {
    /// Name of the reader the tag is (or was) on.
    pub reader: String,

    /// Answer-to-reset bytes, empty when unknown (e.g. after removal).
    pub atr: Vec<u8>,
}

impl TagHandle {
    /// Create a new tag handle.
    pub fn new(reader: impl Into<String>, atr: Vec<u8>) -> Self {
        Self {
            reader: reader.into(),
            atr,
        }
    }
}

/// One notification from the event source: tags that arrived and tags that left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagEventBatch {
    pub added: Vec<TagHandle>,
    pub removed: Vec<TagHandle>,
}

impl TagEventBatch {
    /// A batch with a single arrival.
    pub fn arrival(handle: TagHandle) -> Self {
        Self {
            added: vec![handle],
            removed: Vec::new(),
        }
    }

    /// A batch with a single removal.
    pub fn removal(handle: TagHandle) -> Self {
        Self {
            added: Vec::new(),
            removed: vec![handle],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
