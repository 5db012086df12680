//! Tag presence monitor.
//!
//! The monitor consumes the transport's insertion/removal batches and turns
//! each physical transition into exactly one [`PresenceEvent`] on a single
//! channel, consumed by one broadcast loop downstream.
//!
//! ```text
//! ┌───────────┐ batches ┌──────────────┐ PresenceEvent ┌─────────────┐
//! │ Transport │────────►│ Monitor task │──────────────►│ Bridge hub  │
//! │ watch()   │         │ (GET UID)    │    (mpsc)     │ (broadcast) │
//! └───────────┘         └──────────────┘               └─────────────┘
//! ```
//!
//! On insertion the monitor opens a session and reads the identifier; a
//! failed read is logged as a warning and produces no event. Removals always
//! produce an event, without identifier. Re-presenting the same tag yields
//! independent events; nothing is de-duplicated.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tagbridge_hardware::mock::{MockTag, MockTransport};
//! use tagbridge_hardware::monitor::PresenceMonitor;
//! use tagbridge_core::PresenceKind;
//!
//! #[tokio::main]
//! async fn main() -> tagbridge_hardware::Result<()> {
//!     let (transport, handle) = MockTransport::with_reader("Reader 0");
//!     let mut monitor = PresenceMonitor::new(Arc::new(transport)).start()?;
//!
//!     handle.insert_tag("Reader 0", MockTag::ntag213(vec![0x04, 0xA1, 0xB2, 0xC3])).await?;
//!
//!     let event = monitor.recv().await.unwrap();
//!     assert_eq!(event.kind, PresenceKind::Detected);
//!     assert_eq!(event.serial_number.unwrap().as_str(), "04:A1:B2:C3");
//!
//!     monitor.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::{ReaderTransport, Result, TagEventStream, TagHandle, TagSession};
use std::sync::Arc;
use tagbridge_core::constants::GET_UID;
use tagbridge_core::{PresenceEvent, TagSerial};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Depth of the presence event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Watches a transport for tag transitions.
pub struct PresenceMonitor<T> {
    transport: Arc<T>,
}

impl<T> PresenceMonitor<T>
where
    T: ReaderTransport + 'static,
{
    /// Create a monitor over `transport`.
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Start the event source and spawn the monitor task.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport's event source cannot be started.
    pub fn start(self) -> Result<PresenceHandle> {
        let events = self.transport.watch()?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (tag_tx, tag_rx) = watch::channel(None);

        info!("Starting NFC tag monitoring");
        let task = tokio::spawn(run(self.transport, events, event_tx, tag_tx));

        Ok(PresenceHandle {
            event_rx,
            current_tag: tag_rx,
            task,
        })
    }
}

/// Receiving side of a running [`PresenceMonitor`].
pub struct PresenceHandle {
    event_rx: mpsc::Receiver<PresenceEvent>,
    current_tag: watch::Receiver<Option<TagSerial>>,
    task: JoinHandle<()>,
}

impl PresenceHandle {
    /// Next presence event, or `None` once the event source has closed.
    pub async fn recv(&mut self) -> Option<PresenceEvent> {
        self.event_rx.recv().await
    }

    /// Identifier of the tag most recently detected and not yet removed.
    pub fn current_tag(&self) -> Option<TagSerial> {
        self.current_tag.borrow().clone()
    }

    /// Split off the event receiver, e.g. to hand it to the bridge, keeping
    /// the task handle for shutdown.
    pub fn into_parts(self) -> (mpsc::Receiver<PresenceEvent>, MonitorTask) {
        (
            self.event_rx,
            MonitorTask {
                current_tag: self.current_tag,
                task: self.task,
            },
        )
    }

    /// Stop the monitor task.
    pub async fn shutdown(self) {
        self.into_parts().1.shutdown().await;
    }
}

/// The monitor task once its event receiver has been taken.
pub struct MonitorTask {
    current_tag: watch::Receiver<Option<TagSerial>>,
    task: JoinHandle<()>,
}

impl MonitorTask {
    /// Identifier of the tag most recently detected and not yet removed.
    pub fn current_tag(&self) -> Option<TagSerial> {
        self.current_tag.borrow().clone()
    }

    /// Abort the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.task.abort();
        // A cancelled JoinError is the expected outcome here.
        let _ = self.task.await;
    }
}

async fn run<T: ReaderTransport>(
    transport: Arc<T>,
    mut events: TagEventStream,
    event_tx: mpsc::Sender<PresenceEvent>,
    current_tag: watch::Sender<Option<TagSerial>>,
) {
    while let Some(batch) = events.next().await {
        for handle in &batch.added {
            let Some(serial) = read_serial(transport.as_ref(), handle) else {
                continue;
            };
            info!(serial = %serial, reader = %handle.reader, "Tag detected");
            current_tag.send_replace(Some(serial.clone()));
            if event_tx
                .send(PresenceEvent::detected(serial, handle.reader.clone()))
                .await
                .is_err()
            {
                return;
            }
        }

        for handle in &batch.removed {
            info!(reader = %handle.reader, "Tag removed");
            current_tag.send_replace(None);
            if event_tx.send(PresenceEvent::removed()).await.is_err() {
                return;
            }
        }
    }

    debug!("Tag event source closed, monitor stopping");
}

/// Read the identifier of a freshly inserted tag; `None` (with a warning) on failure.
fn read_serial<T: ReaderTransport>(transport: &T, handle: &TagHandle) -> Option<TagSerial> {
    let response = transport
        .connect(&handle.reader)
        .and_then(|mut session| session.transmit(&GET_UID));

    match response {
        Ok(response) if response.is_success() => match TagSerial::from_bytes(&response.data) {
            Ok(serial) => Some(serial),
            Err(e) => {
                warn!(reader = %handle.reader, error = %e, "Tag identifier unusable");
                None
            }
        },
        Ok(response) => {
            warn!(
                reader = %handle.reader,
                status = %response.status_hex(),
                "Error reading tag UID"
            );
            None
        }
        Err(e) => {
            warn!(reader = %handle.reader, error = %e, "Error reading tag");
            None
        }
    }
}
