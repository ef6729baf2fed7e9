//! Bootstrap and startup errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::server::ListenerError;
use crate::module::ModuleError;
use crate::routing::RouteError;

/// Errors raised while registering parts of an application.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("module {0:?} is already registered")]
    DuplicateModule(String),

    #[error("socket event {0:?} is already registered")]
    DuplicateSocketEvent(String),
}

/// Fatal error raised by [`App::start`](crate::app::App::start).
///
/// Wraps the first failure; nothing is listening when one is returned.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("module {module:?} failed to initialize: {source}")]
    ModuleInitialize {
        module: String,
        #[source]
        source: ModuleError,
    },

    #[error("route table: {0}")]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}
