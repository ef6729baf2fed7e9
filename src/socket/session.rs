//! Per-connection socket sessions.
//!
//! # Responsibilities
//! - Upgrade HTTP requests on the socket path
//! - Read frames in arrival order and dispatch them one at a time
//! - Write replies and emitted frames through a dedicated writer task
//! - Track open connections and close them on shutdown
//! - Drop a handler still running when the grace period expires
//!
//! # Design Decisions
//! - One task per connection; connections never wait on each other
//! - Ping/pong is answered by the transport

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    routing::{get, MethodRouter},
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::context::Context;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::socket::frame::{bad_frame, Outbound, OutboundFrame};
use crate::socket::registry::SocketRegistry;

/// Frames queued per connection before `emit` starts dropping.
pub const OUTBOUND_CAPACITY: usize = 64;

/// How long a closing session waits for its writer to flush.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Live socket connections.
#[derive(Debug, Default)]
pub struct Connections {
    open: DashMap<Uuid, Instant>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self, id: Uuid) {
        self.open.insert(id, Instant::now());
        metrics::record_socket_connections(self.open.len());
    }

    fn close(&self, id: &Uuid) {
        if let Some((_, opened)) = self.open.remove(id) {
            tracing::debug!(connection = %id, duration_ms = opened.elapsed().as_millis() as u64, "Socket session closed");
        }
        metrics::record_socket_connections(self.open.len());
    }

    pub fn count(&self) -> usize {
        self.open.len()
    }
}

/// Everything a session needs, shared by all connections.
#[derive(Clone)]
pub struct SessionState {
    pub registry: Arc<SocketRegistry>,
    pub ctx: Arc<Context>,
    pub connections: Arc<Connections>,
    /// Stops reading new frames.
    pub shutdown: Arc<Shutdown>,
    /// Cancels the handler currently running on a connection.
    pub abandon: Arc<Shutdown>,
}

/// Route accepting socket upgrades.
pub fn upgrade_route(state: SessionState) -> MethodRouter {
    get(move |ws: WebSocketUpgrade| {
        let state = state.clone();
        async move { ws.on_upgrade(move |socket| run_session(socket, state)) }
    })
}

async fn run_session(socket: WebSocket, state: SessionState) {
    let id = Uuid::new_v4();
    let mut shutdown = state.shutdown.subscribe();
    let mut abandon = state.abandon.subscribe();
    if state.shutdown.is_triggered() {
        return;
    }

    state.connections.open(id);
    tracing::debug!(connection = %id, "Socket session opened");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_CAPACITY);

    let mut writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(frame) => {
                    if sink.send(Message::Text(frame.to_text().into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                tracing::debug!(connection = %id, "Closing socket session for shutdown");
                break;
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let reply = tokio::select! {
                        reply = state.registry.handle_text(&state.ctx, id, text.as_str(), &tx) => reply,
                        _ = abandon.recv() => {
                            tracing::warn!(connection = %id, "Socket handler abandoned at shutdown");
                            break;
                        }
                    };
                    if let Some(frame) = reply {
                        if !deliver(&tx, frame, &mut abandon).await {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    let err = bad_frame("Binary frames are not supported");
                    if !deliver(&tx, OutboundFrame::error(&err), &mut abandon).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection = %id, error = %e, "Socket read failed");
                    break;
                }
            },
        }
    }

    let _ = tx.try_send(Outbound::Close);
    drop(tx);
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        tracing::debug!(connection = %id, "Socket writer did not flush in time");
        writer.abort();
    }
    state.connections.close(&id);
}

/// Queue `frame`, waiting for room unless the session is abandoned.
async fn deliver(
    tx: &mpsc::Sender<Outbound>,
    frame: OutboundFrame,
    abandon: &mut broadcast::Receiver<()>,
) -> bool {
    tokio::select! {
        sent = tx.send(Outbound::Frame(frame)) => sent.is_ok(),
        _ = abandon.recv() => false,
    }
}
