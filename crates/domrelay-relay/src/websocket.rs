// SPDX-FileCopyrightText: 2026 Domrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket relay to the backend.
//!
//! A background task owns the socket. Outbound frames reach it over an mpsc
//! queue, inbound commands leave it over another. When the socket drops the
//! task reconnects after a fixed delay until shut down. A frame whose write
//! fails is kept and written first on the next connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domrelay_config::model::RelayConfig;
use domrelay_core::types::{AdapterType, HealthStatus, InboundCommand, OutboundEvent};
use domrelay_core::{DomRelayError, PluginAdapter, RelayAdapter};
use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::protocol;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const QUEUE_DEPTH: usize = 256;

/// Time allowed for the connection task to close the socket on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// [`RelayAdapter`] over a JSON-framed WebSocket.
pub struct WebSocketRelay {
    url: String,
    reconnect: Duration,
    connected: Arc<AtomicBool>,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: Option<mpsc::Receiver<String>>,
    inbound_tx: mpsc::Sender<InboundCommand>,
    inbound_rx: Mutex<mpsc::Receiver<InboundCommand>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WebSocketRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketRelay")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl WebSocketRelay {
    pub fn new(config: &RelayConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_DEPTH);
        let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_DEPTH);
        Self {
            url: config.url.clone(),
            reconnect: Duration::from_secs(config.reconnect_secs),
            connected: Arc::new(AtomicBool::new(false)),
            outbound_tx,
            outbound_rx: Some(outbound_rx),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Whether a socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[async_trait]
impl PluginAdapter for WebSocketRelay {
    fn name(&self) -> &str {
        "websocket"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Relay
    }

    async fn health_check(&self) -> Result<HealthStatus, DomRelayError> {
        if self.is_connected() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded(format!("reconnecting to {}", self.url)))
        }
    }

    async fn shutdown(&self) -> Result<(), DomRelayError> {
        self.cancel.cancel();
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => debug!("relay connection task finished"),
            Ok(Err(e)) => warn!(error = %e, "relay connection task panicked"),
            Err(_) => warn!("relay connection task did not stop in time"),
        }
        Ok(())
    }
}

#[async_trait]
impl RelayAdapter for WebSocketRelay {
    /// Opens the first connection; failure here is reported to the caller.
    /// Later drops are retried in the background.
    async fn connect(&mut self) -> Result<(), DomRelayError> {
        let Some(outbound_rx) = self.outbound_rx.take() else {
            return Ok(());
        };

        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| DomRelayError::Relay {
                message: format!("failed to connect to {}", self.url),
                source: Some(Box::new(e)),
            })?;
        info!(url = %self.url, "connected to backend");
        self.connected.store(true, Ordering::Release);

        let connection = Connection {
            url: self.url.clone(),
            reconnect: self.reconnect,
            connected: Arc::clone(&self.connected),
            outbound_rx,
            pending: None,
            inbound_tx: self.inbound_tx.clone(),
            cancel: self.cancel.clone(),
        };
        *self.task.lock().await = Some(tokio::spawn(connection.run(socket)));
        Ok(())
    }

    async fn emit(&self, event: OutboundEvent) -> Result<(), DomRelayError> {
        if !self.is_connected() {
            return Err(DomRelayError::relay(format!(
                "not connected to {}, dropping {} event",
                self.url,
                protocol::event_name(&event)
            )));
        }
        let frame = protocol::encode(&event)?;
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| DomRelayError::relay("relay connection task has stopped"))
    }

    async fn receive(&self) -> Result<InboundCommand, DomRelayError> {
        let mut inbound = self.inbound_rx.lock().await;
        tokio::select! {
            command = inbound.recv() => command.ok_or(DomRelayError::RelayClosed),
            _ = self.cancel.cancelled() => Err(DomRelayError::RelayClosed),
        }
    }
}

/// Why a socket session ended.
enum SessionEnd {
    Cancelled,
    Dropped,
}

/// State owned by the background connection task.
struct Connection {
    url: String,
    reconnect: Duration,
    connected: Arc<AtomicBool>,
    outbound_rx: mpsc::Receiver<String>,
    /// Frame taken off the queue whose write failed.
    pending: Option<String>,
    inbound_tx: mpsc::Sender<InboundCommand>,
    cancel: CancellationToken,
}

impl Connection {
    async fn run(mut self, first: Socket) {
        let mut socket = Some(first);
        loop {
            let current = match socket.take() {
                Some(s) => s,
                None => match connect_async(self.url.as_str()).await {
                    Ok((s, _)) => {
                        info!(url = %self.url, "reconnected to backend");
                        s
                    }
                    Err(e) => {
                        warn!(url = %self.url, error = %e, "backend connection failed");
                        if self.wait_before_retry().await {
                            continue;
                        }
                        break;
                    }
                },
            };

            self.connected.store(true, Ordering::Release);
            let end = self.serve(current).await;
            self.connected.store(false, Ordering::Release);

            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::Dropped => {
                    warn!(
                        url = %self.url,
                        retry_in = ?self.reconnect,
                        "backend connection dropped, reconnecting"
                    );
                    if !self.wait_before_retry().await {
                        break;
                    }
                }
            }
        }
        debug!("relay connection task exiting");
    }

    /// Sleeps for the reconnect delay. Returns false if cancelled meanwhile.
    async fn wait_before_retry(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.reconnect) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    async fn serve(&mut self, socket: Socket) -> SessionEnd {
        let (mut write, mut read) = socket.split();
        if let Some(frame) = self.pending.take() {
            debug!("resending frame from the previous connection");
            if !send_frame(&mut write, &mut self.pending, frame).await {
                return SessionEnd::Dropped;
            }
        }
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "failed to send close frame");
                    }
                    return SessionEnd::Cancelled;
                }
                frame = self.outbound_rx.recv() => {
                    let Some(frame) = frame else {
                        return SessionEnd::Cancelled;
                    };
                    if !send_frame(&mut write, &mut self.pending, frame).await {
                        return SessionEnd::Dropped;
                    }
                }
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text).await,
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            error!(error = %e, "failed to send pong");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "backend socket error");
                        return SessionEnd::Dropped;
                    }
                },
            }
        }
    }

    async fn dispatch(&self, text: &str) {
        match protocol::decode(text) {
            Ok(Some(command)) => {
                if self.inbound_tx.send(command).await.is_err() {
                    debug!("no receiver for inbound command");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "discarding malformed frame from backend"),
        }
    }
}

/// Writes `frame`. On failure the frame is left in `pending` and false is
/// returned.
async fn send_frame<S>(write: &mut S, pending: &mut Option<String>, frame: String) -> bool
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    match write.send(Message::text(frame.clone())).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "failed to write frame to backend, keeping it for the next connection");
            *pending = Some(frame);
            false
        }
    }
}
