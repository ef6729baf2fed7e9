//! A started application and its shutdown sequence.
//!
//! # Shutdown Sequence
//! ```text
//! stop()
//!     → shutdown fires: listener stops accepting, sockets stop reading
//!     → wait for the server and open sockets, bounded by the grace period
//!     → grace elapsed: abandon fires, in-flight handlers are dropped
//!     → teardown modules in reverse registration order
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::context::Context;
use crate::lifecycle::{wait_for_signal, Shutdown};
use crate::module::Module;
use crate::socket::Connections;

/// How long abandoned work gets to unwind before the server task is aborted.
const ABANDON_WAIT: Duration = Duration::from_secs(1);

const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Outcome of [`RunningApp::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// All in-flight work finished within the grace period.
    pub drained: bool,
    /// Socket sessions still open after the abandon wait.
    pub open_sockets: usize,
    /// Modules whose teardown failed, in teardown order.
    pub failed_teardowns: Vec<String>,
}

/// An application whose listener is accepting connections.
pub struct RunningApp {
    pub(crate) local_addr: SocketAddr,
    pub(crate) ctx: Arc<Context>,
    pub(crate) modules: Vec<Box<dyn Module>>,
    pub(crate) shutdown: Arc<Shutdown>,
    pub(crate) abandon: Arc<Shutdown>,
    pub(crate) server: JoinHandle<io::Result<()>>,
    pub(crate) grace: Duration,
    pub(crate) connections: Arc<Connections>,
}

impl RunningApp {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Number of open socket connections.
    pub fn socket_connections(&self) -> usize {
        self.connections.count()
    }

    /// Wait for SIGINT or SIGTERM, then stop.
    pub async fn run_until_signal(self) -> ShutdownSummary {
        wait_for_signal().await;
        self.stop().await
    }

    /// Stop accepting, drain within the grace period, then tear down modules.
    pub async fn stop(self) -> ShutdownSummary {
        let RunningApp {
            ctx,
            modules,
            shutdown,
            abandon,
            server,
            grace,
            connections,
            ..
        } = self;

        tracing::info!(grace_secs = grace.as_secs_f64(), "Stopping application");
        shutdown.trigger();

        let mut server = Some(server);
        let drained = tokio::time::timeout(grace, drain(&mut server, &connections))
            .await
            .is_ok();

        if !drained {
            tracing::warn!(
                open_sockets = connections.count(),
                "Grace period elapsed, abandoning in-flight work"
            );
            abandon.trigger();
            if tokio::time::timeout(ABANDON_WAIT, drain(&mut server, &connections))
                .await
                .is_err()
            {
                if let Some(handle) = server.take() {
                    handle.abort();
                }
                tracing::warn!("Server task aborted");
            }
        }

        let open_sockets = connections.count();
        let failed_teardowns = teardown_all(&modules, &ctx).await;
        tracing::info!(
            drained,
            open_sockets,
            failed = failed_teardowns.len(),
            "Shutdown complete"
        );

        ShutdownSummary {
            drained,
            open_sockets,
            failed_teardowns,
        }
    }
}

impl std::fmt::Debug for RunningApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningApp")
            .field("local_addr", &self.local_addr)
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("grace", &self.grace)
            .finish()
    }
}

/// Wait for the serve task to finish and every socket session to close.
///
/// `server` is cleared once the task has completed so the wait can be resumed.
async fn drain(server: &mut Option<JoinHandle<io::Result<()>>>, connections: &Connections) {
    if let Some(handle) = server.as_mut() {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
            Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        }
        *server = None;
    }

    while connections.count() > 0 {
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

/// Tear `modules` down in reverse order, returning the names that failed.
pub(crate) async fn teardown_all(modules: &[Box<dyn Module>], ctx: &Context) -> Vec<String> {
    let mut failed = Vec::new();
    for module in modules.iter().rev() {
        match module.teardown(ctx).await {
            Ok(()) => tracing::info!(module = module.name(), "Module torn down"),
            Err(e) => {
                tracing::error!(module = module.name(), error = %e, "Module teardown failed");
                failed.push(module.name().to_string());
            }
        }
    }
    failed
}
