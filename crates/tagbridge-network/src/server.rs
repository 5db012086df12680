//! WebSocket bridge between the tag reader and browser peers.
//!
//! # Architecture
//!
//! ```text
//!                         ┌─────────────┐
//! PresenceMonitor ──────► │ relay task  │──Broadcast──┐
//!                         └─────────────┘             ▼
//! Browser A ◄──► peer task ◄──────────────────── hub task
//! Browser B ◄──► peer task ◄──────────────────────┘
//!                   │
//!                   └── write_tag ──► spawn_blocking(TagWriter::write)
//! ```
//!
//! Each peer task owns its socket. It answers the peer's commands in order
//! and forwards whatever the hub queues for it. A write runs on the blocking
//! pool, so the peer that asked waits for its `write_result` while broadcasts
//! and other peers keep flowing. The shared [`TagWriter`] admits one write at
//! a time; a second peer's write queues behind the first.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tagbridge_hardware::mock::MockTransport;
//! use tagbridge_network::{BridgeConfig, BridgeServer};
//! use tagbridge_rfid::{TagWriter, WriterConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, _handle) = MockTransport::with_reader("Reader 0");
//! let writer = Arc::new(TagWriter::new(Arc::new(transport), WriterConfig::default())?);
//!
//! let server = BridgeServer::bind(BridgeConfig::default(), writer).await?;
//! let (_events_tx, events) = mpsc::channel(16);
//! server.run(events).await?;
//! # Ok(())
//! # }
//! ```

use crate::hub::{self, HubHandle, PeerId};
use crate::message::{ClientMessage, ServerMessage, correlation_label};
use crate::{BridgeConfig, BridgeError, Result};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tagbridge_core::{PresenceEvent, ReaderDescriptor, WriteResult};
use tagbridge_hardware::ReaderTransport;
use tagbridge_rfid::TagWriter;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, error, info, trace, warn};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// State shared by every peer task.
struct PeerContext<T> {
    writer: Arc<TagWriter<T>>,
    hub: HubHandle,
    connected_message: String,
}

/// WebSocket server relaying presence events and tag writes.
pub struct BridgeServer<T> {
    listener: TcpListener,
    context: Arc<PeerContext<T>>,
}

impl<T: ReaderTransport + 'static> BridgeServer<T> {
    /// Bind the listening socket and start the hub.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::BindFailed`] if the address cannot be resolved
    /// or is already in use.
    pub async fn bind(config: BridgeConfig, writer: Arc<TagWriter<T>>) -> Result<Self> {
        info!("Binding bridge to {}", config.bind_addr);

        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|e| BridgeError::bind_failed(&config.bind_addr, e))?;

        let (hub, _) = hub::spawn();
        info!("Bridge listening on ws://{}", config.bind_addr);

        Ok(Self {
            listener,
            context: Arc::new(PeerContext {
                writer,
                hub,
                connected_message: config.connected_message,
            }),
        })
    }

    /// Address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> HubHandle {
        self.context.hub.clone()
    }

    /// Serve peers and relay `events` until the process ends.
    ///
    /// # Errors
    ///
    /// Never returns an error today; see [`run_until`](Self::run_until).
    pub async fn run(self, events: mpsc::Receiver<PresenceEvent>) -> Result<()> {
        self.run_until(events, std::future::pending()).await
    }

    /// Serve peers and relay `events` until `shutdown` completes.
    ///
    /// Accept errors are logged and the loop continues. Connections already
    /// open keep running after shutdown until their peers leave.
    ///
    /// # Errors
    ///
    /// Reserved for fatal listener errors; none are produced at present.
    pub async fn run_until<F>(self, events: mpsc::Receiver<PresenceEvent>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let relay = tokio::spawn(relay_presence(events, self.context.hub.clone()));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        let context = Arc::clone(&self.context);
                        tokio::spawn(async move {
                            if let Err(e) = serve_peer(stream, addr, context).await {
                                warn!(%addr, error = %e, "Connection ended with error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "Accept failed"),
                },
                () = &mut shutdown => {
                    info!("Bridge shutting down");
                    break;
                }
            }
        }

        relay.abort();
        Ok(())
    }
}

/// Forward presence transitions to the hub for broadcast.
async fn relay_presence(mut events: mpsc::Receiver<PresenceEvent>, hub: HubHandle) {
    while let Some(event) = events.recv().await {
        let Some(message) = ServerMessage::from_presence(&event) else {
            warn!(?event, "Presence event without serial number");
            continue;
        };
        if hub.broadcast(message).is_err() {
            break;
        }
    }
    debug!("Presence relay stopped");
}

async fn serve_peer<T: ReaderTransport + 'static>(
    stream: TcpStream,
    addr: SocketAddr,
    context: Arc<PeerContext<T>>,
) -> Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut sink, mut source) = ws_stream.split();

    let id = PeerId::new();
    let (outbox, mut inbox) = hub::peer_queue();
    context.hub.register(id, outbox)?;
    info!(peer = %id, %addr, "Peer connected");

    let outcome: Result<()> = async {
        let greeting = ServerMessage::Connected {
            message: context.connected_message.clone(),
            readers: context.readers(),
        };
        send(&mut sink, &greeting).await?;

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = context.handle_text(id, &text).await {
                            send(&mut sink, &reply).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => trace!(peer = %id, "Ignoring non-text frame"),
                    Some(Err(e)) => return Err(BridgeError::from(e)),
                },
                queued = inbox.recv() => match queued {
                    Some(message) => send(&mut sink, &message).await?,
                    None => {
                        warn!(peer = %id, "Dropped by the hub, closing");
                        break;
                    }
                },
            }
        }
        Ok(())
    }
    .await;

    context.hub.unregister(id);
    info!(peer = %id, "Peer disconnected");
    outcome
}

async fn send(sink: &mut WsSink, message: &ServerMessage) -> Result<()> {
    let json = serde_json::to_string(message)?;
    trace!(kind = message.kind(), %json, "Sending");
    sink.send(Message::Text(json)).await?;
    Ok(())
}

impl<T: ReaderTransport + 'static> PeerContext<T> {
    /// Answer one text frame. Malformed and unknown messages get no reply.
    async fn handle_text(&self, peer: PeerId, text: &str) -> Option<ServerMessage> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(%peer, error = %e, data = %text, "Ignoring invalid message");
                return None;
            }
        };
        debug!(%peer, ?message, "Received");

        Some(match message {
            ClientMessage::Ping => ServerMessage::Pong,
            ClientMessage::GetReaders => ServerMessage::ReadersList {
                readers: self.readers(),
            },
            ClientMessage::WriteTag { data, request_id } => self.write(data, request_id).await,
        })
    }

    async fn write(&self, data: Value, request_id: Option<Value>) -> ServerMessage {
        let writer = Arc::clone(&self.writer);
        let correlation_id = request_id.as_ref().map(correlation_label);
        let fallback_id = correlation_id.clone();

        let result = tokio::task::spawn_blocking(move || writer.write(&data, correlation_id))
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Write task failed");
                WriteResult::failure(e, None, fallback_id)
            });

        ServerMessage::write_result(result, request_id)
    }

    /// Current readers; enumeration errors yield an empty list.
    fn readers(&self) -> Vec<ReaderDescriptor> {
        self.writer
            .transport()
            .list_readers()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to list readers");
                Vec::new()
            })
    }
}
