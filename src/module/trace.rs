//! Request tracing module.
//!
//! Attaches per-request spans and `x-request-id` correlation IDs. Holds no
//! capability; it only wraps the transport.

use async_trait::async_trait;
use axum::{http::HeaderName, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::context::ContextBuilder;
use crate::http::request::X_REQUEST_ID;
use crate::module::{Module, ModuleError};

#[derive(Debug, Default)]
pub struct TraceModule;

impl TraceModule {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for TraceModule {
    fn name(&self) -> &str {
        "trace"
    }

    async fn initialize(&self, _ctx: &mut ContextBuilder) -> Result<(), ModuleError> {
        Ok(())
    }

    fn attach(&self, router: Router) -> Router {
        let header = HeaderName::from_static(X_REQUEST_ID);
        // Layers run outside-in: assign the ID, then trace, then propagate it back
        router
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(header, MakeRequestUuid))
    }
}
