//! Route table construction.
//!
//! # Responsibilities
//! - Collect `(method, path, handler)` entries through the `Routes` helper
//! - Filter entries gated on a deployment mode
//! - Reject duplicates and pattern paths
//! - Mount the table onto an Axum router with the shared context
//!
//! # Design Decisions
//! - Exact-match only: paths carrying `{}`, `*` or `:` segments are refused
//! - Mode gating happens once at build time; the active set never changes

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use thiserror::Error;

use crate::config::DeploymentMode;
use crate::context::Context;
use crate::lifecycle::Shutdown;
use crate::routing::handler::{dispatch, RouteHandler};

/// Errors raised while building a route table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("duplicate route {method} {path}")]
    DuplicateRoute { method: Method, path: String },

    #[error("invalid route path {0:?} (must start with '/' and contain no patterns)")]
    InvalidPath(String),

    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),
}

/// One registered route.
#[derive(Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub path: String,
    pub handler: Arc<dyn RouteHandler>,
    /// When set, the route only exists in this deployment mode.
    pub only_in: Option<DeploymentMode>,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("only_in", &self.only_in)
            .finish()
    }
}

/// Route-registration helper passed to `App::apply_routes` callbacks.
#[derive(Default)]
pub struct Routes {
    entries: Vec<RouteEntry>,
    gate: Option<DeploymentMode>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` + `path`.
    pub fn route<H>(&mut self, method: Method, path: &str, handler: H) -> &mut Self
    where
        H: RouteHandler,
    {
        self.entries.push(RouteEntry {
            method,
            path: path.to_string(),
            handler: Arc::new(handler),
            only_in: self.gate,
        });
        self
    }

    pub fn get<H: RouteHandler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::GET, path, handler)
    }

    pub fn post<H: RouteHandler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::POST, path, handler)
    }

    pub fn put<H: RouteHandler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::PUT, path, handler)
    }

    pub fn delete<H: RouteHandler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.route(Method::DELETE, path, handler)
    }

    /// Register the routes added by `f` only when running in `mode`.
    pub fn only_in<F>(&mut self, mode: DeploymentMode, f: F) -> &mut Self
    where
        F: FnOnce(&mut Routes),
    {
        let outer = self.gate.replace(mode);
        f(self);
        self.gate = outer;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the immutable table for `mode`.
    pub fn build(self, mode: DeploymentMode) -> Result<RouteTable, RouteError> {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for entry in self.entries {
            if entry.only_in.is_some_and(|gate| gate != mode) {
                tracing::debug!(method = %entry.method, path = %entry.path, mode = %mode, "Route skipped for mode");
                continue;
            }

            validate_path(&entry.path)?;
            MethodFilter::try_from(entry.method.clone())
                .map_err(|_| RouteError::UnsupportedMethod(entry.method.clone()))?;

            let key = (entry.method.clone(), entry.path.clone());
            if index.contains_key(&key) {
                return Err(RouteError::DuplicateRoute {
                    method: entry.method,
                    path: entry.path,
                });
            }
            index.insert(key, entries.len());
            entries.push(entry);
        }

        Ok(RouteTable { entries, index })
    }
}

pub(crate) fn validate_path(path: &str) -> Result<(), RouteError> {
    let valid = path.starts_with('/')
        && !path.contains(['{', '}', '*'])
        && !path.split('/').any(|segment| segment.starts_with(':'));
    if valid {
        Ok(())
    } else {
        Err(RouteError::InvalidPath(path.to_string()))
    }
}

/// Immutable `(method, path) → handler` mapping.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    index: HashMap<(Method, String), usize>,
}

impl RouteTable {
    /// Exact-match lookup.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<&RouteEntry> {
        self.index
            .get(&(method.clone(), path.to_string()))
            .and_then(|i| self.entries.get(*i))
    }

    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.lookup(method, path).is_some()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mount every entry onto a router, injecting `ctx` into each invocation.
    ///
    /// Handlers still running when `abandon` fires are cancelled.
    pub fn into_router(self, ctx: Arc<Context>, abandon: Arc<Shutdown>) -> Router {
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();

        for entry in self.entries {
            let Ok(filter) = MethodFilter::try_from(entry.method.clone()) else {
                // Checked during build
                continue;
            };

            let handler = entry.handler;
            let ctx = ctx.clone();
            let abandon = abandon.clone();
            let route: Arc<str> = Arc::from(entry.path.as_str());
            let service = move |request: Request<Body>| {
                let handler = handler.clone();
                let ctx = ctx.clone();
                let route = route.clone();
                let abandon = abandon.clone();
                async move { dispatch(handler, ctx, route, request, abandon).await }
            };

            let method_router = match by_path.remove(&entry.path) {
                Some(existing) => existing.on(filter, service),
                None => axum::routing::on(filter, service),
            };
            by_path.insert(entry.path, method_router);
        }

        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| {
                router.route(&path, method_router)
            })
    }
}
