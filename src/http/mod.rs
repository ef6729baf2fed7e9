//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (bind, Axum serve, graceful drain)
//!     → middleware.rs (CORS, body limit, timeout)
//!     → routing table (exact method + path match)
//!     → request.rs (request ID, JSON body parsing)
//!     → envelope.rs (data / error envelopes)
//!     → Send to client
//! ```

pub mod envelope;
pub mod middleware;
pub mod request;
pub mod server;

pub use envelope::{Envelope, ErrorBody, ErrorEnvelope, HandlerError};
pub use request::{read_json, request_id, DEFAULT_JSON_LIMIT, X_REQUEST_ID};
pub use server::ListenerError;
