//! PC/SC reader transport.
//!
//! Talks to any PC/SC compliant reader (ACR122U and friends) through the
//! system smart card service. Insertions and removals are observed by a
//! dedicated thread blocked in `SCardGetStatusChange`, which forwards
//! batches into the async world.

use crate::{
    ApduResponse, HardwareError, ReaderTransport, Result, TagEventBatch, TagEventStream,
    TagHandle, TagSession,
};
use pcsc::{
    Card, Context, MAX_BUFFER_SIZE, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode,
    State,
};
use std::ffi::{CStr, CString};
use std::time::Duration;
use tagbridge_core::ReaderDescriptor;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// How long the watcher blocks before checking whether anyone still listens.
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// PC/SC backed transport.
pub struct PcscTransport {
    context: Context,
}

impl PcscTransport {
    /// Connect to the system PC/SC service.
    ///
    /// # Errors
    ///
    /// Returns an error if the smart card service is not running.
    pub fn establish() -> Result<Self> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }
}

fn reader_names(context: &Context) -> Result<Vec<CString>> {
    match context.list_readers_owned() {
        Ok(names) => Ok(names),
        Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

impl ReaderTransport for PcscTransport {
    type Session = PcscSession;

    fn list_readers(&self) -> Result<Vec<ReaderDescriptor>> {
        Ok(reader_names(&self.context)?
            .iter()
            .enumerate()
            .map(|(index, name)| ReaderDescriptor::new(name.to_string_lossy(), index))
            .collect())
    }

    fn connect(&self, reader: &str) -> Result<PcscSession> {
        let name = CString::new(reader)
            .map_err(|_| HardwareError::malformed(format!("Reader name {reader:?}")))?;

        let card = match self.context.connect(&name, ShareMode::Shared, Protocols::ANY) {
            Ok(card) => card,
            Err(pcsc::Error::NoSmartcard) | Err(pcsc::Error::RemovedCard) => {
                return Err(HardwareError::disconnected(format!("no tag on {reader}")));
            }
            Err(pcsc::Error::UnknownReader) => return Err(HardwareError::reader_not_found(reader)),
            Err(e) => return Err(e.into()),
        };

        Ok(PcscSession { card })
    }

    fn watch(&self) -> Result<TagEventStream> {
        let (tx, stream) = TagEventStream::channel(EVENT_CHANNEL_CAPACITY);
        let context = self.context.clone();

        std::thread::Builder::new()
            .name("pcsc-watch".to_string())
            .spawn(move || watch_loop(context, tx))?;

        Ok(stream)
    }
}

/// Session on a PC/SC card handle.
pub struct PcscSession {
    card: Card,
}

impl TagSession for PcscSession {
    fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse> {
        let mut buffer = [0u8; MAX_BUFFER_SIZE];
        let raw = match self.card.transmit(command, &mut buffer) {
            Ok(raw) => raw,
            Err(pcsc::Error::RemovedCard) | Err(pcsc::Error::ResetCard) => {
                return Err(HardwareError::disconnected("tag left the field"));
            }
            Err(e) => return Err(e.into()),
        };
        ApduResponse::from_raw(raw)
    }
}

/// Blocking status-change loop; runs until the stream is dropped or PC/SC fails.
fn watch_loop(context: Context, tx: mpsc::Sender<TagEventBatch>) {
    let mut states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];
    info!("PC/SC watcher started");

    loop {
        let names = match reader_names(&context) {
            Ok(names) => names,
            Err(e) => {
                error!(error = %e, "Cannot enumerate readers, watcher stopping");
                return;
            }
        };

        states.retain(|rs| {
            is_pnp(rs.name()) || names.iter().any(|n| n.as_c_str() == rs.name())
        });
        for name in names {
            if !states.iter().any(|rs| rs.name() == name.as_c_str()) {
                debug!(reader = %name.to_string_lossy(), "Watching reader");
                states.push(ReaderState::new(name, State::UNAWARE));
            }
        }
        for rs in &mut states {
            rs.sync_current_state();
        }

        match context.get_status_change(STATUS_POLL_INTERVAL, &mut states) {
            Ok(()) => {}
            Err(pcsc::Error::Timeout) => {
                if tx.is_closed() {
                    return;
                }
                continue;
            }
            Err(e) => {
                error!(error = %e, "Status change failed, watcher stopping");
                return;
            }
        }

        let batch = collect_transitions(&states);
        if !batch.is_empty() && tx.blocking_send(batch).is_err() {
            info!("PC/SC watcher stopped: no listener");
            return;
        }
    }
}

fn is_pnp(name: &CStr) -> bool {
    name == PNP_NOTIFICATION()
}

fn collect_transitions(states: &[ReaderState]) -> TagEventBatch {
    let mut batch = TagEventBatch::default();

    for rs in states.iter().filter(|rs| !is_pnp(rs.name())) {
        let was_present = rs.current_state().contains(State::PRESENT);
        let is_present = rs.event_state().contains(State::PRESENT);
        let reader = rs.name().to_string_lossy().into_owned();

        match (was_present, is_present) {
            (false, true) => batch.added.push(TagHandle::new(reader, rs.atr().to_vec())),
            (true, false) => batch.removed.push(TagHandle::new(reader, Vec::new())),
            _ => {}
        }
    }

    batch
}
