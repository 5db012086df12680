//! `tagbridge`: serve the NFC reader to browser peers over WebSocket.

mod args;

use anyhow::{Context, Result, bail};
use args::{Args, TransportKind};
use clap::Parser;
use std::sync::Arc;
use tagbridge_hardware::devices::AnyTransport;
use tagbridge_hardware::mock::{MockTag, MockTransport, MockTransportHandle};
use tagbridge_hardware::{PresenceMonitor, ReaderTransport};
use tagbridge_network::BridgeServer;
use tagbridge_rfid::TagWriter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MOCK_READER: &str = "Mock Reader 0";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // The mock handle owns the event sender; keep it alive for the whole run.
    let (transport, _mock) = open_transport(args.transport)?;
    run(args, Arc::new(transport)).await
}

fn open_transport(kind: TransportKind) -> Result<(AnyTransport, Option<MockTransportHandle>)> {
    match kind {
        TransportKind::Mock => {
            let (transport, handle) = MockTransport::with_reader(MOCK_READER);
            handle.place_tag(
                MOCK_READER,
                MockTag::ntag215(vec![0x04, 0x5A, 0x12, 0x9C, 0x33, 0x80, 0x01]),
            )?;
            warn!("Using the mock reader; no hardware will be touched");
            Ok((AnyTransport::Mock(transport), Some(handle)))
        }
        #[cfg(feature = "hardware-pcsc")]
        TransportKind::Pcsc => {
            let transport = tagbridge_hardware::pcsc_transport::PcscTransport::establish()
                .context("failed to connect to the PC/SC service")?;
            Ok((AnyTransport::Pcsc(transport), None))
        }
        #[cfg(not(feature = "hardware-pcsc"))]
        TransportKind::Pcsc => {
            bail!("PC/SC support not compiled in; rebuild with --features hardware-pcsc")
        }
    }
}

async fn run(args: Args, transport: Arc<AnyTransport>) -> Result<()> {
    info!("{}", "=".repeat(60));
    info!("NFC tag bridge {} starting", tagbridge_core::VERSION);
    info!("{}", "=".repeat(60));

    let readers = transport
        .list_readers()
        .context("failed to enumerate readers")?;
    if readers.is_empty() {
        error!("No NFC reader found");
        error!("  Check that:");
        error!("  1. the reader is plugged in over USB");
        error!("  2. its driver is installed");
        error!("  3. the system smart card service lists it");
        bail!("no NFC reader found");
    }

    info!("NFC readers found: {}", readers.len());
    for reader in &readers {
        info!("  {}. {}", reader.index + 1, reader.name);
    }

    let writer = TagWriter::new(Arc::clone(&transport), args.writer_config())
        .context("invalid writer configuration")?;

    let monitor = PresenceMonitor::new(Arc::clone(&transport))
        .start()
        .context("failed to start tag monitoring")?;
    let (events, monitor_task) = monitor.into_parts();

    let config = args.bridge_config();
    let url = format!("ws://{}", config.bind_addr);
    let server = BridgeServer::bind(config, Arc::new(writer)).await?;

    info!("WebSocket server: {url}");
    info!("Bridge active, waiting for connections...");
    info!("{}", "-".repeat(60));

    server.run_until(events, shutdown_signal()).await?;

    monitor_task.shutdown().await;
    info!("Bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Interrupted by user");
}
