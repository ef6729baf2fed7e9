//! Typed application bootstrapper.
//!
//! Composes modules over an HTTP route table and a WebSocket event channel:
//! environment validation, ordered module lifecycle, middleware attachment,
//! exact-match routing and bounded start/stop.

// Core subsystems
pub mod app;
pub mod context;
pub mod http;
pub mod module;
pub mod routing;
pub mod socket;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

// Binary surface
pub mod site;

pub use app::{App, BootstrapError, RunningApp, ShutdownSummary, StartupError};
pub use config::{AppConfig, DeploymentMode, EnvConfig, EnvError};
pub use context::{Context, ContextBuilder, ContextError};
pub use http::{Envelope, HandlerError};
pub use lifecycle::Shutdown;
pub use module::{Module, ModuleError};
pub use routing::Routes;
pub use socket::SocketEvent;
