//! WebSocket transport client — connect/reconnect loop, framing, fan-out.
//!
//! The client owns one persistent connection. A background task dials the
//! endpoint, decodes inbound text frames at the boundary, and republishes
//! them on a broadcast channel; the handle side only pushes outbound text
//! into an unbounded queue. Losing the connection never aborts an
//! in-flight exchange differently from any other stream failure — the
//! coordinator sees the same event either way.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use banter_core::frames::{ChatRequest, StreamFrame};

use crate::config::TransportConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast buffer for inbound events. A coordinator that lags this far
/// behind a stream has effectively lost it anyway.
const EVENT_BUFFER: usize = 256;

/// Connection lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; a reconnect may be pending.
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Connected and able to carry frames.
    Open,
}

/// One inbound occurrence on the transport.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// A well-formed frame.
    Frame(StreamFrame),
    /// A frame that failed to deserialize. The connection stays open.
    BadFrame(String),
    /// The peer closed the connection gracefully.
    Closed,
    /// A socket-level failure (dial or I/O).
    Failed(String),
}

/// The seam the engine talks through, so tests can substitute a fake.
pub trait Transport: Send + Sync {
    /// Observable connection state.
    fn state(&self) -> watch::Receiver<ConnectionState>;
    /// Subscribe to inbound events. Events sent before subscribing are
    /// not replayed.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
    /// Fire-and-forget send. Dropped (and logged) when not `Open`;
    /// callers must not assume delivery.
    fn send(&self, request: &ChatRequest);
}

/// Production transport over `tokio-tungstenite`.
pub struct WsTransport {
    out_tx: mpsc::UnboundedSender<String>,
    state_rx: watch::Receiver<ConnectionState>,
    event_tx: broadcast::Sender<TransportEvent>,
    _task: JoinHandle<()>,
}

impl WsTransport {
    /// Start the connection task. Requires a tokio runtime.
    pub fn spawn(config: TransportConfig) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let task = tokio::spawn(run(config, out_rx, state_tx, event_tx.clone()));
        Self {
            out_tx,
            state_rx,
            event_tx,
            _task: task,
        }
    }
}

impl Transport for WsTransport {
    fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.event_tx.subscribe()
    }

    fn send(&self, request: &ChatRequest) {
        if *self.state_rx.borrow() != ConnectionState::Open {
            warn!("transport not open, dropping outbound frame");
            return;
        }
        match serde_json::to_string(request) {
            Ok(text) => {
                if self.out_tx.send(text).is_err() {
                    warn!("transport task stopped, dropping outbound frame");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize outbound frame"),
        }
    }
}

/// Why a connection's read/write loop ended.
enum DriveEnd {
    /// The client handle was dropped; stop reconnecting.
    Dropped,
    /// The connection was lost; the reconnect loop takes over.
    Lost,
}

/// Connect/reconnect loop.
///
/// Reconnects after a fixed delay. `max_reconnect_attempts` caps
/// *consecutive failed dials*; a successful connection resets the count.
async fn run(
    config: TransportConfig,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<TransportEvent>,
) {
    let url = config.connect_url();
    let mut failed_attempts: u32 = 0;

    loop {
        let _ = state_tx.send_replace(ConnectionState::Connecting);
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                failed_attempts = 0;
                info!(url = %config.url, "transport connected");
                let _ = state_tx.send_replace(ConnectionState::Open);
                let end = drive(ws, &mut out_rx, &event_tx).await;
                let _ = state_tx.send_replace(ConnectionState::Disconnected);
                if matches!(end, DriveEnd::Dropped) {
                    debug!("transport handle dropped, stopping");
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, url = %config.url, "transport connect failed");
                let _ = event_tx.send(TransportEvent::Failed(e.to_string()));
                let _ = state_tx.send_replace(ConnectionState::Disconnected);
                failed_attempts += 1;
                if let Some(cap) = config.max_reconnect_attempts {
                    if failed_attempts >= cap {
                        warn!(cap, "reconnect attempt cap reached, giving up");
                        return;
                    }
                }
            }
        }
        tokio::time::sleep(config.reconnect_interval).await;
    }
}

/// Pump one live connection until it ends.
async fn drive(
    ws: WsStream,
    out_rx: &mut mpsc::UnboundedReceiver<String>,
    event_tx: &broadcast::Sender<TransportEvent>,
) -> DriveEnd {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        warn!(error = %e, "socket send failed");
                        let _ = event_tx.send(TransportEvent::Failed(e.to_string()));
                        return DriveEnd::Lost;
                    }
                }
                None => return DriveEnd::Dropped,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<StreamFrame>(&text) {
                        Ok(frame) => {
                            let _ = event_tx.send(TransportEvent::Frame(frame));
                        }
                        Err(e) => {
                            warn!(error = %e, "malformed inbound frame");
                            let _ = event_tx.send(TransportEvent::BadFrame(e.to_string()));
                        }
                    }
                }
                // Ping/pong/binary carry nothing for us.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    debug!("socket closed by peer");
                    let _ = event_tx.send(TransportEvent::Closed);
                    return DriveEnd::Lost;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "socket read failed");
                    let _ = event_tx.send(TransportEvent::Failed(e.to_string()));
                    return DriveEnd::Lost;
                }
            },
        }
    }
}
