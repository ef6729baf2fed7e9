//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (grace period > 0, body limit > 0)
//! - Check addresses and origins parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("shutdown.grace_period_secs must be greater than zero")]
    GracePeriod,

    #[error("http.body_limit_bytes must be greater than zero")]
    BodyLimit,

    #[error("http.cors_origins entry {0:?} is not a valid origin")]
    CorsOrigin(String),

    #[error("sockets.path {0:?} must start with '/'")]
    SocketPath(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.shutdown.grace_period_secs == 0 {
        errors.push(ValidationError::GracePeriod);
    }

    if config.http.body_limit_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }

    for origin in &config.http.cors_origins {
        let valid = url::Url::parse(origin)
            .map(|u| u.has_host() && matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }

    if !config.sockets.path.starts_with('/') {
        errors.push(ValidationError::SocketPath(config.sockets.path.clone()));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
