//! Socket event registry.
//!
//! # Responsibilities
//! - Map event names to handlers, unique per registry
//! - Decode a text frame, invoke the matching handler with the context
//! - Turn handler errors, panics and unknown events into error frames
//!
//! # Design Decisions
//! - Registry is immutable once the application starts
//! - Failures are answered on the offending connection only

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::context::Context;
use crate::http::envelope::HandlerError;
use crate::observability::metrics;
use crate::routing::handler::panic_message;
use crate::socket::frame::{InboundFrame, Outbound, OutboundFrame};

/// Errors raised while registering socket handlers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SocketError {
    #[error("socket event {0:?} is already registered")]
    DuplicateSocketEvent(String),
}

/// One socket event delivered to a handler.
pub struct SocketEvent {
    pub ctx: Arc<Context>,
    pub connection: Uuid,
    pub event: String,
    pub payload: Value,
    outbound: mpsc::Sender<Outbound>,
}

impl SocketEvent {
    pub fn new(
        ctx: Arc<Context>,
        connection: Uuid,
        frame: InboundFrame,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            ctx,
            connection,
            event: frame.event,
            payload: frame.payload,
            outbound,
        }
    }

    /// Send an extra frame on this connection.
    ///
    /// Returns false, dropping the frame, when the connection's queue is full
    /// or its writer has gone away.
    pub fn emit(&self, event: impl Into<String>, payload: Value) -> bool {
        match self
            .outbound
            .try_send(Outbound::Frame(OutboundFrame::event(event, payload)))
        {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(connection = %self.connection, event = %self.event, "Outbound queue full, frame dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Deserialize the payload into a typed value.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// A function bound to one socket event name.
pub trait SocketHandler: Send + Sync + 'static {
    fn call(&self, event: SocketEvent) -> BoxFuture<'static, Result<Option<Value>, HandlerError>>;
}

impl<F, Fut> SocketHandler for F
where
    F: Fn(SocketEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, HandlerError>> + Send + 'static,
{
    fn call(&self, event: SocketEvent) -> BoxFuture<'static, Result<Option<Value>, HandlerError>> {
        Box::pin((self)(event))
    }
}

/// Immutable-after-start mapping from event name to handler.
#[derive(Default)]
pub struct SocketRegistry {
    handlers: BTreeMap<String, Arc<dyn SocketHandler>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    pub fn register<H>(&mut self, event: &str, handler: H) -> Result<(), SocketError>
    where
        H: SocketHandler,
    {
        if self.handlers.contains_key(event) {
            return Err(SocketError::DuplicateSocketEvent(event.to_string()));
        }
        self.handlers.insert(event.to_string(), Arc::new(handler));
        Ok(())
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handle one text frame from `connection`.
    ///
    /// Returns the frame to send back, if any.
    pub async fn handle_text(
        &self,
        ctx: &Arc<Context>,
        connection: Uuid,
        text: &str,
        outbound: &mpsc::Sender<Outbound>,
    ) -> Option<OutboundFrame> {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(connection = %connection, error = %err, "Rejected socket frame");
                metrics::record_socket_event("invalid", "bad_frame");
                return Some(OutboundFrame::error(&err));
            }
        };

        let Some(handler) = self.handlers.get(&frame.event).cloned() else {
            tracing::debug!(connection = %connection, event = %frame.event, "Unknown socket event");
            metrics::record_socket_event("unknown", "unknown_event");
            let err = HandlerError::new(
                axum::http::StatusCode::NOT_FOUND,
                "unknown_event",
                format!("No handler for event {:?}", frame.event),
            );
            return Some(OutboundFrame::error(&err));
        };

        let event_name = frame.event.clone();
        let event = SocketEvent::new(ctx.clone(), connection, frame, outbound.clone());
        let outcome = AssertUnwindSafe(async move { handler.call(event).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(reply)) => {
                metrics::record_socket_event(&event_name, "ok");
                reply.map(|payload| OutboundFrame::event(event_name, payload))
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    connection = %connection,
                    event = %event_name,
                    code = err.code(),
                    "Socket handler returned error"
                );
                metrics::record_socket_event(&event_name, "error");
                Some(OutboundFrame::error(&err))
            }
            Err(panic) => {
                metrics::record_socket_event(&event_name, "panic");
                let err = HandlerError::internal(format!(
                    "socket handler for {event_name:?} panicked: {}",
                    panic_message(panic.as_ref())
                ));
                Some(OutboundFrame::error(&err))
            }
        }
    }
}

impl std::fmt::Debug for SocketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketRegistry")
            .field("events", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentMode;
    use serde_json::json;

    async fn echo(event: SocketEvent) -> Result<Option<Value>, HandlerError> {
        Ok(Some(event.payload))
    }

    async fn shout(event: SocketEvent) -> Result<Option<Value>, HandlerError> {
        let text: String = event.payload_as()?;
        event.emit("heard", json!(text.clone()));
        Ok(None)
    }

    async fn broken(_event: SocketEvent) -> Result<Option<Value>, HandlerError> {
        Err(HandlerError::bad_request("missing field"))
    }

    fn setup() -> (
        SocketRegistry,
        Arc<Context>,
        mpsc::Sender<Outbound>,
        mpsc::Receiver<Outbound>,
    ) {
        let mut registry = SocketRegistry::new();
        registry.register("echo", echo).unwrap();
        registry.register("shout", shout).unwrap();
        registry.register("broken", broken).unwrap();
        let ctx = Arc::new(Context::builder(DeploymentMode::Test).build());
        let (tx, rx) = mpsc::channel(8);
        (registry, ctx, tx, rx)
    }

    #[test]
    fn test_duplicate_event_rejected() {
        let mut registry = SocketRegistry::new();
        registry.register("echo", echo).unwrap();
        assert_eq!(
            registry.register("echo", echo),
            Err(SocketError::DuplicateSocketEvent("echo".into()))
        );
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_reply_and_emit() {
        let (registry, ctx, tx, mut rx) = setup();
        let id = Uuid::new_v4();

        let reply = registry
            .handle_text(&ctx, id, r#"{"type":"echo","payload":{"n":1}}"#, &tx)
            .await;
        assert_eq!(reply, Some(OutboundFrame::event("echo", json!({"n": 1}))));

        let reply = registry
            .handle_text(&ctx, id, r#"{"type":"shout","payload":"hey"}"#, &tx)
            .await;
        assert_eq!(reply, None);
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(OutboundFrame::event("heard", json!("hey"))))
        );
    }

    #[tokio::test]
    async fn test_failures_become_error_frames() {
        let (registry, ctx, tx, _rx) = setup();
        let id = Uuid::new_v4();

        let codes = [
            (r#"{"type":"broken"}"#, "bad_request"),
            (r#"{"type":"missing"}"#, "unknown_event"),
            ("garbage", "bad_frame"),
            (r#"{"type":"shout","payload":5}"#, "bad_request"),
        ];
        for (text, code) in codes {
            let reply = registry.handle_text(&ctx, id, text, &tx).await.unwrap();
            assert_eq!(reply.event, "error");
            assert_eq!(reply.error.unwrap().code, code, "{text}");
        }
    }

    #[tokio::test]
    async fn test_emit_drops_frames_when_queue_full() {
        let ctx = Arc::new(Context::builder(DeploymentMode::Test).build());
        let (tx, mut rx) = mpsc::channel(1);
        let frame = InboundFrame {
            event: "chatty".into(),
            payload: Value::Null,
        };
        let event = SocketEvent::new(ctx, Uuid::new_v4(), frame, tx);

        assert!(event.emit("progress", json!(1)));
        assert!(!event.emit("progress", json!(2)));

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(OutboundFrame::event("progress", json!(1))))
        );
        drop(rx);
        assert!(!event.emit("progress", json!(3)));
    }
}
