//! Client connection handling.
//!
//! Each TCP client gets one transceiver session. Inbound bytes feed the
//! session's transmit path, captured frames stream back out as hex lines.

use crate::backend;
use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use bytes::{Buf, BytesMut};
use rctrx_core::{SessionHandle, Transceiver, TransceiverError};
use rctrx_hal::MockReceiver;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The signal engine.
    pub transceiver: Transceiver,
    /// Feed side of the receiver line, kept alive for the daemon's lifetime
    /// so the edge channel stays open.
    _receiver_line: Option<Arc<MockReceiver>>,
}

/// Run the TCP server.
///
/// # Errors
///
/// Returns an error if the backend or engine cannot be initialized, or if
/// the listener fails.
pub async fn run_server(config: Config) -> Result<()> {
    let backend = backend::build(&config.device)?;
    let transceiver = Transceiver::new(
        config.engine.clone(),
        backend.edge_source,
        backend.carrier,
    )?;

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    if config.device.synthetic_frame_interval_ms > 0 {
        if let Some(line) = backend.receiver_line.clone() {
            info!(
                interval_ms = config.device.synthetic_frame_interval_ms,
                "Synthetic frame feeder enabled"
            );
            tokio::spawn(backend::synthetic_feeder(
                line,
                Duration::from_millis(config.device.synthetic_frame_interval_ms),
            ));
        }
    }

    let state = Arc::new(AppState {
        transceiver,
        _receiver_line: backend.receiver_line,
    });

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;
    info!("Transceiver daemon listening on {}", addr);

    loop {
        let (socket, peer) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            handle_client(socket, peer, &state).await;
        });
    }
}

/// Handle one TCP client for the lifetime of its connection.
async fn handle_client(socket: TcpStream, peer: SocketAddr, state: &AppState) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let session = match state.transceiver.open() {
        Ok(session) => session,
        Err(e) => {
            warn!(%peer, error = %e, "Rejecting client");
            metrics::record_error("session_limit");
            return;
        }
    };
    debug!(session = %session.id(), %peer, "Client connected");

    let (mut reader, mut writer) = socket.into_split();
    let mut inbound = BytesMut::with_capacity(1024);
    let mut frame = [0u8; 512];

    loop {
        tokio::select! {
            result = reader.read_buf(&mut inbound) => {
                match result {
                    Ok(0) => {
                        debug!(session = %session.id(), "Client closed connection");
                        break;
                    }
                    Ok(n) => {
                        metrics::record_bytes(n, "inbound");
                        if !drain_commands(&session, &mut inbound).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session = %session.id(), error = %e, "Socket read error");
                        metrics::record_error("socket");
                        break;
                    }
                }
            }

            result = session.read(&mut frame) => {
                match result {
                    Ok(n) if n > 0 => {
                        if frame[..n].contains(&b'\n') {
                            metrics::record_frame();
                        }
                        metrics::record_bytes(n, "outbound");
                        if writer.write_all(&frame[..n]).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(TransceiverError::Interrupted) => {}
                    Err(e) => {
                        warn!(session = %session.id(), error = %e, "Session read error");
                        metrics::record_error("session_read");
                        break;
                    }
                }
            }
        }
    }

    debug!(session = %session.id(), %peer, "Client disconnected");
}

/// Feed buffered inbound bytes to the session's transmit path.
///
/// Returns `false` when the client should be disconnected.
async fn drain_commands(session: &SessionHandle, inbound: &mut BytesMut) -> bool {
    while !inbound.is_empty() {
        match session.write(inbound).await {
            Ok(accepted) => {
                let commands = inbound[..accepted]
                    .iter()
                    .filter(|b| matches!(b, b'\r' | b'\n'))
                    .count();
                for _ in 0..commands {
                    metrics::record_command();
                }
                inbound.advance(accepted);
            }
            Err(TransceiverError::Interrupted) => {}
            Err(e) => {
                warn!(session = %session.id(), error = %e, "Rejected command");
                metrics::record_error("command");
                return false;
            }
        }
    }
    true
}
