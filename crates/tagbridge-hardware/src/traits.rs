//! Reader transport abstraction.
//!
//! A transport enumerates readers, opens command sessions on them and
//! publishes tag insertion/removal batches. The command path is synchronous
//! because PC/SC itself is: an exchange blocks until the reader answers.
//! Async callers move exchanges to the blocking pool.

use crate::{ApduResponse, HardwareError, Result, TagEventBatch};
use tagbridge_core::ReaderDescriptor;
use tokio::sync::mpsc;

/// Command/response session on one reader.
///
/// A session is scoped to a single detection or write attempt and dropped
/// afterwards; it is never reused across requests.
pub trait TagSession: Send {
    /// Exchange one command with the tag in the field.
    ///
    /// A non-`90 00` status is NOT an error at this level; it is returned in
    /// the response for the caller to interpret.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange itself fails (tag removed, reader
    /// unplugged, malformed response).
    fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse>;
}

/// Access to contactless readers.
///
/// # Examples
///
/// ```
/// use tagbridge_hardware::mock::{MockTag, MockTransport};
/// use tagbridge_hardware::{ReaderTransport, TagSession};
/// use tagbridge_core::constants::GET_UID;
///
/// # #[tokio::main]
/// # async fn main() -> tagbridge_hardware::Result<()> {
/// let (transport, handle) = MockTransport::with_reader("ACS ACR122U");
/// handle.insert_tag("ACS ACR122U", MockTag::ntag213(vec![0x04, 0xA1, 0xB2, 0xC3])).await?;
///
/// let reader = transport.reader_at(0)?;
/// let mut session = transport.connect(&reader.name)?;
/// let response = session.transmit(&GET_UID)?;
/// assert_eq!(response.data, vec![0x04, 0xA1, 0xB2, 0xC3]);
/// # Ok(())
/// # }
/// ```
pub trait ReaderTransport: Send + Sync {
    /// Session type opened by [`connect`](Self::connect).
    type Session: TagSession;

    /// Enumerate attached readers. An empty list is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader subsystem cannot be queried.
    fn list_readers(&self) -> Result<Vec<ReaderDescriptor>>;

    /// Open a session with the tag on `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is unknown or no tag is in the field.
    fn connect(&self, reader: &str) -> Result<Self::Session>;

    /// Start delivering insertion/removal batches.
    ///
    /// # Errors
    ///
    /// Returns an error if the event source cannot be started or was
    /// already taken.
    fn watch(&self) -> Result<TagEventStream>;

    /// Reader at position `index` of the current enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NoReader`] when nothing is attached and
    /// [`HardwareError::ReaderNotFound`] when `index` is past the end.
    fn reader_at(&self, index: usize) -> Result<ReaderDescriptor> {
        let readers = self.list_readers()?;
        if readers.is_empty() {
            return Err(HardwareError::NoReader);
        }
        let available = readers.len();
        readers.into_iter().nth(index).ok_or_else(|| {
            HardwareError::reader_not_found(format!("index {index} ({available} available)"))
        })
    }
}

/// Receiving end of a transport's event source.
#[derive(Debug)]
pub struct TagEventStream {
    rx: mpsc::Receiver<TagEventBatch>,
}

impl TagEventStream {
    /// Create a stream and the sender a transport feeds it with.
    pub fn channel(capacity: usize) -> (mpsc::Sender<TagEventBatch>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Next batch, or `None` once the source has shut down.
    pub async fn next(&mut self) -> Option<TagEventBatch> {
        self.rx.recv().await
    }
}
