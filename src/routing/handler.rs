//! Route handler abstraction and dispatch.
//!
//! # Responsibilities
//! - Accept plain async functions `(Arc<Context>, Request) -> Result<R, HandlerError>`
//! - Invoke a handler with the shared context
//! - Turn errors and panics into the error envelope at the handler boundary
//!
//! # Design Decisions
//! - Panics are caught per request; the connection and process keep running
//! - Metrics and logs use the registered route, not the raw URI

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::{BoxFuture, FutureExt};

use crate::context::Context;
use crate::http::envelope::HandlerError;
use crate::http::request::request_id;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// A function bound to one `(method, path)` pair.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(
        &self,
        ctx: Arc<Context>,
        request: Request<Body>,
    ) -> BoxFuture<'static, Result<Response, HandlerError>>;
}

impl<F, Fut, R> RouteHandler for F
where
    F: Fn(Arc<Context>, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: IntoResponse,
{
    fn call(
        &self,
        ctx: Arc<Context>,
        request: Request<Body>,
    ) -> BoxFuture<'static, Result<Response, HandlerError>> {
        let fut = (self)(ctx, request);
        Box::pin(async move { fut.await.map(IntoResponse::into_response) })
    }
}

/// Response for work cut off when the shutdown grace period expires.
pub fn abandoned() -> HandlerError {
    HandlerError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        "shutting_down",
        "Server is shutting down",
    )
}

/// Run `handler` for one request.
///
/// Never fails: handler errors become their envelope, panics become an
/// `internal` envelope. When `abandon` fires the handler future is dropped
/// and its result discarded.
pub async fn dispatch(
    handler: Arc<dyn RouteHandler>,
    ctx: Arc<Context>,
    route: Arc<str>,
    request: Request<Body>,
    abandon: Arc<Shutdown>,
) -> Response {
    let start = Instant::now();
    let mut abandoned_rx = abandon.subscribe();
    let method = request.method().clone();
    let request_id = request_id(&request).unwrap_or("unknown").to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        route = %route,
        "Dispatching request"
    );

    let outcome = if abandon.is_triggered() {
        None
    } else {
        tokio::select! {
            outcome = AssertUnwindSafe(async move { handler.call(ctx, request).await }).catch_unwind() => Some(outcome),
            _ = abandoned_rx.recv() => None,
        }
    };

    let response = match outcome {
        None => {
            tracing::warn!(request_id = %request_id, route = %route, "Request abandoned at shutdown");
            abandoned().into_response()
        }
        Some(Ok(Ok(response))) => response,
        Some(Ok(Err(err))) => {
            tracing::warn!(
                request_id = %request_id,
                route = %route,
                code = err.code(),
                status = err.status().as_u16(),
                "Handler returned error"
            );
            err.into_response()
        }
        Some(Err(panic)) => {
            HandlerError::internal(format!(
                "handler for {method} {route} panicked: {}",
                panic_message(panic.as_ref())
            ))
            .into_response()
        }
    };

    metrics::record_request(method.as_str(), &route, response.status().as_u16(), start);
    response
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentMode;
    use std::time::Duration;

    fn ctx() -> Arc<Context> {
        Arc::new(Context::builder(DeploymentMode::Test).build())
    }

    async fn ok(_ctx: Arc<Context>, _req: Request<Body>) -> Result<&'static str, HandlerError> {
        Ok("fine")
    }

    async fn fails(_ctx: Arc<Context>, _req: Request<Body>) -> Result<&'static str, HandlerError> {
        Err(HandlerError::bad_request("nope"))
    }

    async fn panics(_ctx: Arc<Context>, _req: Request<Body>) -> Result<&'static str, HandlerError> {
        panic!("boom")
    }

    async fn slow(_ctx: Arc<Context>, _req: Request<Body>) -> Result<&'static str, HandlerError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("late")
    }

    async fn run(handler: Arc<dyn RouteHandler>) -> StatusCode {
        let abandon = Arc::new(Shutdown::new());
        dispatch(handler, ctx(), Arc::from("/t"), Request::new(Body::empty()), abandon)
            .await
            .status()
    }

    #[tokio::test]
    async fn test_dispatch_outcomes() {
        assert_eq!(run(Arc::new(ok)).await, StatusCode::OK);
        assert_eq!(run(Arc::new(fails)).await, StatusCode::BAD_REQUEST);
        assert_eq!(run(Arc::new(panics)).await, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_abandon_drops_in_flight_handler() {
        let abandon = Arc::new(Shutdown::new());
        let task = tokio::spawn(dispatch(
            Arc::new(slow),
            ctx(),
            Arc::from("/slow"),
            Request::new(Body::empty()),
            abandon.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        abandon.trigger();

        let response = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
