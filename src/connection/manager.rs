//! Connection manager with a persistent server link and automatic reconnection

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use wolhub_shared::codec::{self, FrameDecoder};

/// Events emitted by the connection manager
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Successfully connected to the server
    Connected,
    /// Disconnected from the server
    Disconnected { reason: String },
    /// Received one line frame from the server
    Received(String),
    /// A connection attempt failed
    ConnectionFailed { reason: String },
}

/// Configuration for the connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Control server address
    pub server_addr: String,
    /// Initial reconnection delay
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read timeout; longer than the heartbeat interval so a quiet but
    /// healthy link is not torn down
    pub read_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5131".into(),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Manages the persistent server connection.
///
/// Owns a background task that dials, reads, and writes; the control loop
/// talks to it through two channels: line frames in via [`sender`], events
/// out via [`recv`].
pub struct ConnectionManager {
    outbound_tx: mpsc::Sender<String>,
    event_rx: mpsc::Receiver<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop
    pub fn new(config: ConnectionConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(100);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);

        tokio::spawn(async move {
            connection_loop(config, outbound_rx, event_tx).await;
        });

        Self {
            outbound_tx,
            event_rx,
        }
    }

    /// Queue a line frame for the server
    pub async fn send(&self, line: String) -> Result<()> {
        self.outbound_tx
            .send(line)
            .await
            .map_err(|_| anyhow!("connection task gone"))
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }

    /// Clone of the outbound sender, for components that emit frames directly
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.outbound_tx.clone()
    }
}

/// Dial-handle-backoff loop
async fn connection_loop(
    config: ConnectionConfig,
    mut outbound_rx: mpsc::Receiver<String>,
    event_tx: mpsc::Sender<ConnectionEvent>,
) {
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        match timeout(config.connect_timeout, TcpStream::connect(&config.server_addr)).await {
            Ok(Ok(stream)) => {
                info!("connected to {}", config.server_addr);
                reconnect_delay = config.reconnect_delay;

                let _ = event_tx.send(ConnectionEvent::Connected).await;

                if let Err(reason) =
                    handle_connection(stream, &config, &mut outbound_rx, &event_tx).await
                {
                    warn!("connection lost: {}", reason);
                    let _ = event_tx
                        .send(ConnectionEvent::Disconnected {
                            reason: reason.to_string(),
                        })
                        .await;
                }
            }
            Ok(Err(e)) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: e.to_string(),
                    })
                    .await;
            }
            Err(_) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: format!("connect to {} timed out", config.server_addr),
                    })
                    .await;
            }
        }

        debug!("reconnecting in {:?}", reconnect_delay);
        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }
}

/// Pump one live connection until it errors or closes
async fn handle_connection(
    stream: TcpStream,
    config: &ConnectionConfig,
    outbound_rx: &mut mpsc::Receiver<String>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            Some(line) = outbound_rx.recv() => {
                let encoded = codec::encode(&line)?;
                writer.write_all(&encoded).await?;
            }

            result = timeout(config.read_timeout, reader.read(&mut read_buf)) => {
                match result {
                    Ok(Ok(0)) => {
                        return Err(anyhow!("server closed connection"));
                    }
                    Ok(Ok(n)) => {
                        decoder.extend(&read_buf[..n]);
                        loop {
                            match decoder.decode_next() {
                                Ok(Some(line)) => {
                                    let _ = event_tx.send(ConnectionEvent::Received(line)).await;
                                }
                                Ok(None) => break,
                                // oversized or non-UTF-8 input means the peer
                                // is not speaking our protocol; drop the link
                                Err(e) => return Err(anyhow!("frame error: {}", e)),
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        return Err(anyhow!("read error: {}", e));
                    }
                    Err(_) => {
                        return Err(anyhow!(
                            "no traffic for {:?}, assuming dead link",
                            config.read_timeout
                        ));
                    }
                }
            }
        }
    }
}
