//! Application bootstrapper.
//!
//! # Data Flow
//! ```text
//! App::new(config)
//!     → register_module / apply_middleware / apply_routes / register_socket
//!     → start():
//!         initialize modules (registration order, stop at first failure)
//!         → freeze context
//!         → build route table, mount socket channel and fallback
//!         → module attach hooks, then middleware callbacks
//!         → bind listener, spawn server
//!     → RunningApp::stop()
//! ```
//!
//! # Design Decisions
//! - Registration is synchronous and checked eagerly; startup is the only async step
//! - Axum layers only wrap routes that already exist, so routes are mounted
//!   before any layer is applied
//! - A failed start tears down whatever initialized and never binds

pub mod error;
pub mod running;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::{Method, Uri},
    Router,
};

use crate::config::AppConfig;
use crate::context::{Context, ContextBuilder};
use crate::http::envelope::HandlerError;
use crate::http::server;
use crate::lifecycle::Shutdown;
use crate::module::Module;
use crate::observability::metrics;
use crate::routing::table::validate_path;
use crate::routing::{RouteError, Routes};
use crate::socket::session::{upgrade_route, SessionState};
use crate::socket::{Connections, SocketError, SocketHandler, SocketRegistry};

pub use error::{BootstrapError, StartupError};
pub use running::{RunningApp, ShutdownSummary};

use running::teardown_all;

type MiddlewareFn = Box<dyn FnOnce(Router) -> Router + Send>;
type RoutesFn = Box<dyn FnOnce(&mut Routes) + Send>;

/// An application being assembled.
pub struct App {
    config: AppConfig,
    modules: Vec<Box<dyn Module>>,
    middleware: Vec<MiddlewareFn>,
    routes: Vec<RoutesFn>,
    sockets: SocketRegistry,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            modules: Vec::new(),
            middleware: Vec::new(),
            routes: Vec::new(),
            sockets: SocketRegistry::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Append a module. Names must be unique.
    pub fn register_module<M: Module>(&mut self, module: M) -> Result<&mut Self, BootstrapError> {
        if self.modules.iter().any(|m| m.name() == module.name()) {
            return Err(BootstrapError::DuplicateModule(module.name().to_string()));
        }
        tracing::debug!(module = module.name(), position = self.modules.len(), "Module registered");
        self.modules.push(Box::new(module));
        Ok(self)
    }

    /// Store a callback that wraps the transport router.
    ///
    /// Callbacks run once during start, in registration order, after module
    /// hooks, so their layers are outermost.
    pub fn apply_middleware<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        self.middleware.push(Box::new(f));
        self
    }

    /// Store a callback that registers routes.
    pub fn apply_routes<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut Routes) + Send + 'static,
    {
        self.routes.push(Box::new(f));
        self
    }

    /// Register a socket event handler. Event names must be unique.
    pub fn register_socket<H>(&mut self, event: &str, handler: H) -> Result<&mut Self, BootstrapError>
    where
        H: SocketHandler,
    {
        self.sockets
            .register(event, handler)
            .map_err(|SocketError::DuplicateSocketEvent(name)| {
                BootstrapError::DuplicateSocketEvent(name)
            })?;
        Ok(self)
    }

    /// Initialize modules, assemble the transport and open the listener.
    ///
    /// Returns once the listener accepts connections.
    pub async fn start(self) -> Result<RunningApp, StartupError> {
        let App {
            config,
            modules,
            middleware,
            routes,
            sockets,
        } = self;

        tracing::info!(
            mode = %config.mode,
            modules = modules.len(),
            sockets_enabled = config.sockets.enabled,
            "Starting application"
        );

        let mut builder = ContextBuilder::new(config.mode);
        for (initialized, module) in modules.iter().enumerate() {
            let start = Instant::now();
            if let Err(source) = module.initialize(&mut builder).await {
                tracing::error!(module = module.name(), error = %source, "Module failed to initialize");
                let ctx = builder.build();
                teardown_all(&modules[..initialized], &ctx).await;
                return Err(StartupError::ModuleInitialize {
                    module: module.name().to_string(),
                    source,
                });
            }
            metrics::record_module_init(module.name(), start);
            tracing::info!(module = module.name(), "Module initialized");
        }

        let ctx = Arc::new(builder.build());
        let shutdown = Arc::new(Shutdown::new());
        let abandon = Arc::new(Shutdown::new());
        let connections = Arc::new(Connections::new());

        let state = SessionState {
            registry: Arc::new(sockets),
            ctx: ctx.clone(),
            connections: connections.clone(),
            shutdown: shutdown.clone(),
            abandon: abandon.clone(),
        };
        let bound = async {
            let router = assemble(&config, routes, state, &modules, middleware)?;
            let listener = server::bind(&config.listener.bind_address).await?;
            let local_addr = listener
                .local_addr()
                .map_err(|source| server::ListenerError::Bind {
                    address: config.listener.bind_address.clone(),
                    source,
                })?;
            Ok::<_, StartupError>((listener, local_addr, router))
        }
        .await;

        let (listener, local_addr, router) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                tracing::error!(error = %e, "Startup failed after module initialization");
                teardown_all(&modules, &ctx).await;
                return Err(e);
            }
        };

        let server = server::spawn(listener, router, shutdown.subscribe());
        tracing::info!(address = %local_addr, "Application started");

        Ok(RunningApp {
            local_addr,
            ctx,
            modules,
            shutdown,
            abandon,
            server,
            grace: config.shutdown.grace_period(),
            connections,
        })
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("modules", &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("middleware", &self.middleware.len())
            .field("routes", &self.routes.len())
            .field("sockets", &self.sockets)
            .finish()
    }
}

/// Build the transport router: routes, socket channel, fallback, module
/// hooks, then middleware.
fn assemble(
    config: &AppConfig,
    routes: Vec<RoutesFn>,
    sessions: SessionState,
    modules: &[Box<dyn Module>],
    middleware: Vec<MiddlewareFn>,
) -> Result<Router, StartupError> {
    let mut helper = Routes::new();
    for register in routes {
        register(&mut helper);
    }
    let table = helper.build(config.mode)?;

    let socket_path = config.sockets.path.as_str();
    if config.sockets.enabled {
        validate_path(socket_path)?;
        if table.contains(&Method::GET, socket_path) {
            return Err(RouteError::DuplicateRoute {
                method: Method::GET,
                path: socket_path.to_string(),
            }
            .into());
        }
    } else if !sessions.registry.is_empty() {
        tracing::warn!(
            events = ?sessions.registry.names(),
            "Socket handlers registered but sockets are disabled"
        );
    }

    tracing::info!(routes = table.len(), mode = %config.mode, "Route table built");
    let ctx: Arc<Context> = sessions.ctx.clone();
    let mut router = table.into_router(ctx, sessions.abandon.clone());

    if config.sockets.enabled {
        tracing::info!(
            path = socket_path,
            events = ?sessions.registry.names(),
            "Socket channel mounted"
        );
        router = router.route(socket_path, upgrade_route(sessions));
    }

    router = router.fallback(not_found);

    for module in modules {
        router = module.attach(router);
    }
    for apply in middleware {
        router = apply(router);
    }

    Ok(router)
}

async fn not_found(method: Method, uri: Uri) -> HandlerError {
    HandlerError::not_found(format!("No route for {method} {}", uri.path()))
}
