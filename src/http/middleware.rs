//! Transport-level middleware builders.
//!
//! Used from `App::apply_middleware` callbacks to attach cross-cutting
//! behaviour (CORS policy, body limits, timeouts) ahead of the routes.
//! Rejections produced by these layers are rewritten into the error envelope.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::HttpConfig;
use crate::http::envelope::HandlerError;

/// CORS policy allowing exactly the given origins.
///
/// Origins that are not valid header values are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim_end_matches('/').parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Reject bodies larger than `limit` bytes with 413.
pub fn body_limit_layer(limit: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(limit)
}

/// Abort requests running longer than `secs`.
#[allow(deprecated)]
pub fn timeout_layer(secs: u64) -> TimeoutLayer {
    TimeoutLayer::new(Duration::from_secs(secs))
}

/// Rewrite bare 408/413 rejections from the timeout and body-limit layers
/// into the error envelope. JSON responses pass through untouched.
pub async fn envelope_rejections(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    match response.status() {
        StatusCode::REQUEST_TIMEOUT => {
            HandlerError::new(StatusCode::REQUEST_TIMEOUT, "timeout", "Request timed out")
                .into_response()
        }
        StatusCode::PAYLOAD_TOO_LARGE => HandlerError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "Request body too large",
        )
        .into_response(),
        _ => response,
    }
}

/// Apply the standard HTTP middleware stack described by `config`.
pub fn apply_standard(router: axum::Router, config: &HttpConfig) -> axum::Router {
    router
        .layer(body_limit_layer(config.body_limit_bytes))
        .layer(timeout_layer(config.request_timeout_secs))
        .layer(axum::middleware::map_response(envelope_rejections))
        .layer(cors_layer(&config.cors_origins))
}
