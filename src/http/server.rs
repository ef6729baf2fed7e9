//! HTTP server setup.
//!
//! # Responsibilities
//! - Bind the listening socket
//! - Serve an assembled Axum router with connection info
//! - Stop accepting when the shutdown signal fires, then drain connections
//!
//! # Design Decisions
//! - Binding is separate from serving so bind failures surface before any task spawns
//! - The serve task owns the listener; aborting it drops the socket

use std::net::SocketAddr;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Address could not be parsed.
    #[error("Invalid bind address {address:?}: {reason}")]
    Address { address: String, reason: String },

    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind a TCP listener on `address`.
pub async fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
        ListenerError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.to_string(),
            source,
        })?;

    if let Ok(local_addr) = listener.local_addr() {
        tracing::info!(address = %local_addr, "Listener bound");
    }

    Ok(listener)
}

/// Spawn the serve loop for `router` on `listener`.
pub fn spawn(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<std::io::Result<()>> {
    let app = router.into_make_service_with_connect_info::<SocketAddr>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server no longer accepting connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    })
}
