//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment
//!     → env.rs (required variables, flags, deployment mode)
//!
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → env overlay (WEB_URL, ENABLE_SOCKETS, APP_ENV/NODE_ENV, ...)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Missing required variables are reported all at once, never one by one
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::{parse_flag, DeploymentMode, EnvConfig, EnvError};
pub use loader::{load_config, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use schema::{
    AppConfig, HttpConfig, ListenerConfig, ObservabilityConfig, ShutdownConfig, SocketConfig,
};
