//! Application modules.
//!
//! # Data Flow
//! ```text
//! App::register_module (ordered, unique names)
//!     → initialize (registration order, attaches capabilities to the context)
//!     → attach (registration order, wraps the transport router)
//!     → ... serving ...
//!     → teardown (reverse order, only for initialized modules)
//! ```
//!
//! # Design Decisions
//! - A small closed interface implemented by concrete module types
//! - Modules hold configuration; live resources belong to the context
//! - Teardown failures are reported to the caller, which logs and continues

pub mod cache;
pub mod store;
pub mod trace;

use async_trait::async_trait;
use axum::Router;
use thiserror::Error;

use crate::context::{Context, ContextBuilder, ContextError};

pub use cache::{Cache, CacheModule};
pub use store::{Store, StoreModule};
pub use trace::TraceModule;

/// Errors raised by module hooks.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Could not reach a backing service.
    #[error("failed to connect to {target}: {reason}")]
    Connection { target: String, reason: String },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("{0}")]
    Failed(String),
}

/// A capability unit with lifecycle hooks.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Unique name within one application.
    fn name(&self) -> &str;

    /// Runs once before the listener opens. Modules registered earlier have
    /// already attached their capabilities.
    async fn initialize(&self, ctx: &mut ContextBuilder) -> Result<(), ModuleError>;

    /// Attach transport-level layers. Runs after routes are mounted.
    fn attach(&self, router: Router) -> Router {
        router
    }

    /// Runs once during shutdown, after the listener has closed.
    async fn teardown(&self, _ctx: &Context) -> Result<(), ModuleError> {
        Ok(())
    }
}
