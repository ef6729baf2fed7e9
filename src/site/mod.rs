//! Analytics site served by the binary.
//!
//! Routes and socket events built on the [`Cache`](crate::module::Cache) and
//! [`Store`](crate::module::Store) capabilities.

pub mod routes;
pub mod sockets;

/// Event kinds recorded through the socket channel.
pub const EVENT_KINDS: [&str; 4] = ["page_view", "project_action", "client_error", "search_action"];

pub use routes::register_routes;
pub use sockets::register_sockets;
