//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (app::App::start):
//!     Initialize modules in order → Build tables → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Stop requested → Stop accepting → Drain (bounded) → Teardown in reverse
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: modules first, listeners last (traffic only when ready)
//! - Shutdown has timeout: in-flight work abandoned after the grace period

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
