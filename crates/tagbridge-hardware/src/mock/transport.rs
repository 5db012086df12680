//! Mock reader transport for testing and development.
//!
//! This module provides simulated readers holding simulated Type 2 tags with
//! real page memory, so write sequences can be verified byte for byte without
//! physical hardware.

use crate::{
    ApduResponse, HardwareError, ReaderTransport, Result, TagEventBatch, TagEventStream,
    TagHandle, TagSession,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tagbridge_core::ReaderDescriptor;
use tagbridge_core::constants::{
    BYTES_PER_PAGE, GET_UID, GET_VERSION, STORAGE_CODE_NTAG213, STORAGE_CODE_NTAG215,
    STORAGE_CODE_NTAG216, WRITE_PAGE_HEADER,
};
use tokio::sync::mpsc;

/// Event channel depth; a test that never starts a monitor can still insert
/// this many tags before `insert_tag` waits.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// ATR reported for mock tags (PC/SC part 3, ISO 14443-3 Type A storage card).
const MOCK_ATR: [u8; 20] = [
    0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06, 0x03, 0x00, 0x44,
    0x00, 0x00, 0x00, 0x00, 0x68,
];

/// Status answered by tags without GET VERSION support.
const SW_NOT_SUPPORTED: (u8, u8) = (0x63, 0x00);

/// Status for writes past the end of tag memory.
const SW_OUT_OF_RANGE: (u8, u8) = (0x6B, 0x00);

/// Status for a write whose Lc does not match its data.
const SW_WRONG_LENGTH: (u8, u8) = (0x67, 0x00);

/// Status for commands the mock does not implement.
const SW_INS_NOT_SUPPORTED: (u8, u8) = (0x6D, 0x00);

/// A simulated Type 2 tag.
///
/// # Examples
///
/// ```
/// use tagbridge_hardware::mock::MockTag;
///
/// let tag = MockTag::ntag215(vec![0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66])
///     .with_page_failure(6, 0x6A, 0x82);
/// assert_eq!(tag.memory().len(), 135 * 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTag {
    uid: Vec<u8>,
    version: Option<Vec<u8>>,
    memory: Vec<u8>,
    uid_status: Option<(u8, u8)>,
    page_failure: Option<(u8, u8, u8)>,
}

impl MockTag {
    /// A tag answering GET VERSION with `version` and `total_pages` pages of memory.
    pub fn new(uid: Vec<u8>, version: Option<Vec<u8>>, total_pages: usize) -> Self {
        Self {
            uid,
            version,
            memory: vec![0; total_pages * BYTES_PER_PAGE],
            uid_status: None,
            page_failure: None,
        }
    }

    /// NTAG213: 45 pages, 144 bytes of user memory.
    pub fn ntag213(uid: Vec<u8>) -> Self {
        Self::new(uid, Some(ntag_version(STORAGE_CODE_NTAG213)), 45)
    }

    /// NTAG215: 135 pages, 504 bytes of user memory.
    pub fn ntag215(uid: Vec<u8>) -> Self {
        Self::new(uid, Some(ntag_version(STORAGE_CODE_NTAG215)), 135)
    }

    /// NTAG216: 231 pages, 888 bytes of user memory.
    pub fn ntag216(uid: Vec<u8>) -> Self {
        Self::new(uid, Some(ntag_version(STORAGE_CODE_NTAG216)), 231)
    }

    /// NTAG21x-like tag reporting an arbitrary storage size code.
    pub fn with_storage_code(uid: Vec<u8>, storage_code: u8, total_pages: usize) -> Self {
        Self::new(uid, Some(ntag_version(storage_code)), total_pages)
    }

    /// Original MIFARE Ultralight: 16 pages, no GET VERSION.
    pub fn ultralight(uid: Vec<u8>) -> Self {
        Self::new(uid, None, 16)
    }

    /// Answer GET UID with `sw1 sw2` instead of the identifier.
    pub fn with_uid_failure(mut self, sw1: u8, sw2: u8) -> Self {
        self.uid_status = Some((sw1, sw2));
        self
    }

    /// Reject writes to `page` with `sw1 sw2`.
    pub fn with_page_failure(mut self, page: u8, sw1: u8, sw2: u8) -> Self {
        self.page_failure = Some((page, sw1, sw2));
        self
    }

    /// Tag identifier.
    pub fn uid(&self) -> &[u8] {
        &self.uid
    }

    /// Full tag memory, page 0 first.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Memory from `start_page` on.
    pub fn memory_from(&self, start_page: u8) -> &[u8] {
        let offset = (start_page as usize * BYTES_PER_PAGE).min(self.memory.len());
        &self.memory[offset..]
    }

    fn respond(&mut self, command: &[u8]) -> ApduResponse {
        if command == GET_VERSION {
            return match &self.version {
                Some(version) => ApduResponse::ok(version.clone()),
                None => ApduResponse::status(SW_NOT_SUPPORTED.0, SW_NOT_SUPPORTED.1),
            };
        }

        if command == GET_UID {
            return match self.uid_status {
                Some((sw1, sw2)) => ApduResponse::status(sw1, sw2),
                None => ApduResponse::ok(self.uid.clone()),
            };
        }

        if command.len() >= 5 && command[..3] == WRITE_PAGE_HEADER {
            return self.write_page(command[3], command[4] as usize, &command[5..]);
        }

        ApduResponse::status(SW_INS_NOT_SUPPORTED.0, SW_INS_NOT_SUPPORTED.1)
    }

    fn write_page(&mut self, page: u8, length: usize, data: &[u8]) -> ApduResponse {
        if data.len() != length {
            return ApduResponse::status(SW_WRONG_LENGTH.0, SW_WRONG_LENGTH.1);
        }

        if let Some((failing, sw1, sw2)) = self.page_failure
            && failing == page
        {
            return ApduResponse::status(sw1, sw2);
        }

        let offset = page as usize * BYTES_PER_PAGE;
        let end = offset + length;
        if end > self.memory.len() {
            return ApduResponse::status(SW_OUT_OF_RANGE.0, SW_OUT_OF_RANGE.1);
        }

        self.memory[offset..end].copy_from_slice(data);
        ApduResponse::ok(Vec::new())
    }
}

/// GET VERSION payload of an NXP NTAG21x with the given storage code.
fn ntag_version(storage_code: u8) -> Vec<u8> {
    vec![0x00, 0x04, 0x04, 0x02, 0x01, 0x00, storage_code, 0x03]
}

#[derive(Debug)]
struct MockReader {
    name: String,
    tag: Option<MockTag>,
}

#[derive(Debug, Default)]
struct MockState {
    readers: Vec<MockReader>,
    commands: Vec<Vec<u8>>,
    latency: Duration,
}

impl MockState {
    fn reader_mut(&mut self, name: &str) -> Result<&mut MockReader> {
        self.readers
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| HardwareError::reader_not_found(name))
    }
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock reader transport.
///
/// Returned together with a [`MockTransportHandle`] that attaches readers,
/// places tags and inspects what was sent to them.
///
/// # Examples
///
/// ```
/// use tagbridge_hardware::mock::MockTransport;
/// use tagbridge_hardware::ReaderTransport;
///
/// let (transport, handle) = MockTransport::new();
/// assert!(transport.list_readers().unwrap().is_empty());
///
/// handle.add_reader("Reader 0");
/// assert_eq!(transport.list_readers().unwrap()[0].name, "Reader 0");
/// ```
#[derive(Debug)]
pub struct MockTransport {
    state: SharedState,
    events: Mutex<Option<TagEventStream>>,
}

impl MockTransport {
    /// Create a transport with no readers attached.
    pub fn new() -> (Self, MockTransportHandle) {
        let (event_tx, stream) = TagEventStream::channel(EVENT_CHANNEL_CAPACITY);
        let state = SharedState::default();

        let transport = Self {
            state: Arc::clone(&state),
            events: Mutex::new(Some(stream)),
        };
        let handle = MockTransportHandle { state, event_tx };

        (transport, handle)
    }

    /// Create a transport with one empty reader attached.
    pub fn with_reader(name: impl Into<String>) -> (Self, MockTransportHandle) {
        let (transport, handle) = Self::new();
        handle.add_reader(name);
        (transport, handle)
    }
}

impl ReaderTransport for MockTransport {
    type Session = MockSession;

    fn list_readers(&self) -> Result<Vec<ReaderDescriptor>> {
        Ok(lock(&self.state)
            .readers
            .iter()
            .enumerate()
            .map(|(index, reader)| ReaderDescriptor::new(reader.name.clone(), index))
            .collect())
    }

    fn connect(&self, reader: &str) -> Result<MockSession> {
        let mut state = lock(&self.state);
        if state.reader_mut(reader)?.tag.is_none() {
            return Err(HardwareError::disconnected(format!("no tag on {reader}")));
        }

        Ok(MockSession {
            state: Arc::clone(&self.state),
            reader: reader.to_string(),
        })
    }

    fn watch(&self) -> Result<TagEventStream> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| HardwareError::exchange("Mock event source already taken"))
    }
}

/// Session on a mock reader.
#[derive(Debug)]
pub struct MockSession {
    state: SharedState,
    reader: String,
}

impl TagSession for MockSession {
    fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse> {
        let latency = lock(&self.state).latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let mut state = lock(&self.state);
        state.commands.push(command.to_vec());

        let reader = &self.reader;
        let tag = state
            .reader_mut(reader)?
            .tag
            .as_mut()
            .ok_or_else(|| HardwareError::disconnected(format!("tag left {reader}")))?;

        Ok(tag.respond(command))
    }
}

/// Handle for controlling a [`MockTransport`].
///
/// Clones share the same readers and command log.
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: SharedState,
    event_tx: mpsc::Sender<TagEventBatch>,
}

impl MockTransportHandle {
    /// Attach an empty reader.
    pub fn add_reader(&self, name: impl Into<String>) {
        lock(&self.state).readers.push(MockReader {
            name: name.into(),
            tag: None,
        });
    }

    /// Detach a reader (and whatever tag it held).
    pub fn remove_reader(&self, name: &str) {
        lock(&self.state).readers.retain(|r| r.name != name);
    }

    /// Put a tag on a reader without notifying the event source.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is not attached.
    pub fn place_tag(&self, reader: &str, tag: MockTag) -> Result<()> {
        lock(&self.state).reader_mut(reader)?.tag = Some(tag);
        Ok(())
    }

    /// Put a tag on a reader and publish the arrival.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is not attached or the event source
    /// has been dropped.
    pub async fn insert_tag(&self, reader: &str, tag: MockTag) -> Result<()> {
        self.place_tag(reader, tag)?;
        self.publish(TagEventBatch::arrival(TagHandle::new(reader, MOCK_ATR.to_vec())))
            .await
    }

    /// Take the tag off a reader and publish the removal.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is not attached or the event source
    /// has been dropped.
    pub async fn remove_tag(&self, reader: &str) -> Result<Option<MockTag>> {
        let tag = lock(&self.state).reader_mut(reader)?.tag.take();
        self.publish(TagEventBatch::removal(TagHandle::new(reader, Vec::new())))
            .await?;
        Ok(tag)
    }

    async fn publish(&self, batch: TagEventBatch) -> Result<()> {
        self.event_tx
            .send(batch)
            .await
            .map_err(|_| HardwareError::disconnected("mock event source closed"))
    }

    /// Snapshot of the tag currently on `reader`.
    pub fn tag(&self, reader: &str) -> Option<MockTag> {
        lock(&self.state)
            .readers
            .iter()
            .find(|r| r.name == reader)
            .and_then(|r| r.tag.clone())
    }

    /// Every command sent through any session, oldest first.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        lock(&self.state).commands.clone()
    }

    /// Number of page write commands sent so far.
    pub fn write_count(&self) -> usize {
        lock(&self.state)
            .commands
            .iter()
            .filter(|c| c.len() >= 3 && c[..3] == WRITE_PAGE_HEADER)
            .count()
    }

    /// Delay every exchange by `latency`, the way a real reader's round trip
    /// would. Other sessions may run their exchanges during the delay.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    /// Forget the command log.
    pub fn clear_commands(&self) {
        lock(&self.state).commands.clear();
    }
}
