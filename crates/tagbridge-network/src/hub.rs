//! Peer registry and broadcast fan-out.
//!
//! The set of connected peers is owned by a single hub task. Connections and
//! the presence relay talk to it over one command channel, so registration,
//! removal and broadcast never race and no lock guards the set.
//!
//! ```text
//! peer task ──Register/Unregister──┐
//!                                  ├──► hub task ──► HashMap<PeerId, Sender>
//! presence relay ──Broadcast───────┘        │
//!                                           └──► every peer's outbox
//! ```
//!
//! A peer whose outbox is closed, or still holds [`PEER_QUEUE_CAPACITY`]
//! unsent messages, is dropped during the broadcast that discovers it; the
//! others still receive the message. Dropping its sender closes the peer's
//! inbox, which ends that connection.

use crate::message::ServerMessage;
use crate::{BridgeError, Result};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of one connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Messages a peer may have queued but not yet sent before it is dropped.
pub const PEER_QUEUE_CAPACITY: usize = 64;

/// Outgoing queue of one peer.
pub type PeerSender = mpsc::Sender<ServerMessage>;

/// Create a peer outbox of [`PEER_QUEUE_CAPACITY`].
pub fn peer_queue() -> (PeerSender, mpsc::Receiver<ServerMessage>) {
    mpsc::channel(PEER_QUEUE_CAPACITY)
}

#[derive(Debug)]
enum HubCommand {
    Register { id: PeerId, outbox: PeerSender },
    Unregister { id: PeerId },
    Broadcast(ServerMessage),
    PeerCount(oneshot::Sender<usize>),
}

/// Cloneable handle to the hub task.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Add a peer to the broadcast set.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HubClosed`] if the hub task has stopped.
    pub fn register(&self, id: PeerId, outbox: PeerSender) -> Result<()> {
        self.send(HubCommand::Register { id, outbox })
    }

    /// Remove a peer. Removing an unknown peer is a no-op.
    pub fn unregister(&self, id: PeerId) {
        // a stopped hub holds no peers
        let _ = self.send(HubCommand::Unregister { id });
    }

    /// Queue `message` for every registered peer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HubClosed`] if the hub task has stopped.
    pub fn broadcast(&self, message: ServerMessage) -> Result<()> {
        self.send(HubCommand::Broadcast(message))
    }

    /// Number of registered peers, as seen after every earlier command.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HubClosed`] if the hub task has stopped.
    pub async fn peer_count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::PeerCount(reply))?;
        rx.await.map_err(|_| BridgeError::HubClosed)
    }

    fn send(&self, command: HubCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| BridgeError::HubClosed)
    }
}

/// Start the hub task.
///
/// The task ends once every [`HubHandle`] clone has been dropped.
pub fn spawn() -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(rx));
    (HubHandle { tx }, task)
}

async fn run(mut rx: mpsc::UnboundedReceiver<HubCommand>) {
    let mut peers: HashMap<PeerId, PeerSender> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Register { id, outbox } => {
                peers.insert(id, outbox);
                info!(peer = %id, total = peers.len(), "Peer registered");
            }
            HubCommand::Unregister { id } => {
                if peers.remove(&id).is_some() {
                    info!(peer = %id, total = peers.len(), "Peer unregistered");
                }
            }
            HubCommand::Broadcast(message) => broadcast(&mut peers, message),
            HubCommand::PeerCount(reply) => {
                let _ = reply.send(peers.len());
            }
        }
    }

    debug!("Hub stopped");
}

fn broadcast(peers: &mut HashMap<PeerId, PeerSender>, message: ServerMessage) {
    if peers.is_empty() {
        debug!(kind = message.kind(), "No peers to broadcast to");
        return;
    }

    peers.retain(|id, outbox| match outbox.try_send(message.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(peer = %id, "Dropping peer that stopped reading");
            false
        }
        Err(TrySendError::Closed(_)) => {
            info!(peer = %id, "Dropping disconnected peer");
            false
        }
    });

    info!(kind = message.kind(), peers = peers.len(), "Broadcast");
}
