//! End-to-end write of one payload to the tag on the configured reader.
//!
//! A write runs through fixed stages and never fails outward: every error is
//! folded into a [`WriteResult`] with `success == false`, and the stage it
//! happened in goes to the error log.
//!
//! ```text
//! ReaderLookup → TagDetection → CapacityCheck → Encoding → PagedWrite → Done
//! ```
//!
//! The capacity check runs before the first write command, so an oversized
//! payload leaves the tag untouched.
//!
//! Writes through one [`TagWriter`] are serialized: a caller arriving while
//! another write is in flight waits for it to finish, so the page sequences
//! of two payloads never interleave on the tag.

use crate::detector::detect;
use crate::writer::{PagedWriteReport, write_pages};
use crate::Result;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tagbridge_core::{TagCapability, WriteResult};
use tagbridge_hardware::ReaderTransport;
use tagbridge_ndef::{EncoderConfig, RecordEncoder};
use tracing::{error, info};

/// Characters of payload shown in the write log line.
const PREVIEW_CHARS: usize = 80;

/// Writer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterConfig {
    /// Position of the reader in enumeration order.
    pub reader_index: usize,

    pub encoder: EncoderConfig,
}

/// Stage a write attempt has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    ReaderLookup,
    TagDetection,
    CapacityCheck,
    Encoding,
    PagedWrite,
    Done,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReaderLookup => "reader lookup",
            Self::TagDetection => "tag detection",
            Self::CapacityCheck => "capacity check",
            Self::Encoding => "encoding",
            Self::PagedWrite => "paged write",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Progress of one attempt, kept so a failure can report where it stopped.
#[derive(Debug)]
struct Attempt {
    stage: WriteStage,
    capability: Option<TagCapability>,
}

/// Writes payloads to the tag on one reader.
///
/// Each call opens its own session; nothing is held between writes. Calls
/// from several threads run one at a time.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tagbridge_hardware::mock::{MockTag, MockTransport};
/// use tagbridge_rfid::{TagWriter, WriterConfig};
///
/// let (transport, handle) = MockTransport::with_reader("Reader 0");
/// handle.place_tag("Reader 0", MockTag::ntag213(vec![0x04, 0xA1, 0xB2, 0xC3])).unwrap();
///
/// let writer = TagWriter::new(Arc::new(transport), WriterConfig::default()).unwrap();
/// let result = writer.write(&serde_json::json!({"id": "x1"}), Some("r1".into()));
///
/// assert!(result.success);
/// assert_eq!(result.bytes_written, 11);
/// assert_eq!(result.correlation_id.as_deref(), Some("r1"));
/// ```
#[derive(Debug)]
pub struct TagWriter<T> {
    transport: Arc<T>,
    encoder: RecordEncoder,
    reader_index: usize,
    in_flight: Mutex<()>,
}

impl<T: ReaderTransport> TagWriter<T> {
    /// Create a writer over `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Record`] if the configured language tag is invalid.
    pub fn new(transport: Arc<T>, config: WriterConfig) -> Result<Self> {
        Ok(Self {
            transport,
            encoder: RecordEncoder::new(config.encoder)?,
            reader_index: config.reader_index,
            in_flight: Mutex::new(()),
        })
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Serialize `payload` to compact JSON and write it.
    pub fn write<P: Serialize + ?Sized>(
        &self,
        payload: &P,
        correlation_id: Option<String>,
    ) -> WriteResult {
        match RecordEncoder::serialize(payload) {
            Ok(text) => self.write_text(&text, correlation_id),
            Err(e) => {
                error!(stage = %WriteStage::Encoding, error = %e, "Write failed");
                WriteResult::failure(e, None, correlation_id)
            }
        }
    }

    /// Write `text` as-is. An empty string writes an empty text record.
    ///
    /// Blocks while another write through this writer is in progress.
    pub fn write_text(&self, text: &str, correlation_id: Option<String>) -> WriteResult {
        info!(data = %preview(text), "Write requested");
        // a panicked write left no state behind the lock
        let _in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        let mut attempt = Attempt {
            stage: WriteStage::ReaderLookup,
            capability: None,
        };

        match self.run(text, &mut attempt) {
            Ok((capability, payload_len, report)) => {
                info!(
                    kind = %capability.kind,
                    bytes = payload_len,
                    pages = report.pages_written,
                    "Tag written"
                );
                WriteResult::success(&capability, payload_len, report.pages_written, correlation_id)
            }
            Err(e) => {
                error!(stage = %attempt.stage, error = %e, "Write failed");
                WriteResult::failure(e, attempt.capability.as_ref(), correlation_id)
            }
        }
    }

    fn run(
        &self,
        text: &str,
        attempt: &mut Attempt,
    ) -> Result<(TagCapability, usize, PagedWriteReport)> {
        let reader = self.transport.reader_at(self.reader_index)?;
        let mut session = self.transport.connect(&reader.name)?;

        attempt.stage = WriteStage::TagDetection;
        let capability = detect(&mut session);
        info!(
            reader = %reader.name,
            kind = %capability.kind,
            version = %capability.version_label,
            capacity = capability.capacity_bytes,
            "Tag detected"
        );
        attempt.capability = Some(capability.clone());

        attempt.stage = WriteStage::CapacityCheck;
        RecordEncoder::check_capacity(text, &capability)?;

        attempt.stage = WriteStage::Encoding;
        let container = self.encoder.encode(text, &capability)?;

        attempt.stage = WriteStage::PagedWrite;
        let report = write_pages(
            &mut session,
            container.as_bytes(),
            capability.start_page,
            capability.bytes_per_page,
        )?;

        attempt.stage = WriteStage::Done;
        Ok((capability, container.payload_len(), report))
    }
}

/// First [`PREVIEW_CHARS`] characters of `text`, with an ellipsis if cut.
fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
