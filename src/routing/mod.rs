//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! App::apply_routes callback
//!     → table.rs (Routes helper collects entries)
//!     → table.rs (build: mode filter, validation, duplicate check)
//!     → RouteTable (immutable)
//!     → Axum router, each entry wrapped by handler.rs::dispatch
//! ```
//!
//! # Design Decisions
//! - Exact (method, path) match; no wildcards or parameters
//! - The handler boundary converts every failure into an error envelope

pub mod handler;
pub mod table;

pub use handler::{dispatch, RouteHandler};
pub use table::{RouteEntry, RouteError, RouteTable, Routes};
