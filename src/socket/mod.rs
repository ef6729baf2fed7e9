//! WebSocket channel subsystem.
//!
//! # Data Flow
//! ```text
//! GET <sockets.path> (upgrade)
//!     → session.rs (one task per connection, frames in arrival order)
//!     → frame.rs (decode {"type", "payload"})
//!     → registry.rs (event name → handler, with context)
//!     → frame.rs (encode reply / error frame)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Registry only bound when sockets are enabled
//! - A failing handler answers with an error frame; the connection stays open

pub mod frame;
pub mod registry;
pub mod session;

pub use frame::{InboundFrame, Outbound, OutboundFrame};
pub use registry::{SocketError, SocketEvent, SocketHandler, SocketRegistry};
pub use session::Connections;
