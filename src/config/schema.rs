//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the application.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::env::{DeploymentMode, EnvConfig, EnvError};

/// Root configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment mode (gates development-only routes).
    pub mode: DeploymentMode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// HTTP middleware settings.
    pub http: HttpConfig,

    /// WebSocket channel settings.
    pub sockets: SocketConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Overlay values taken from the validated environment.
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<(), EnvError> {
        if let Some(web_url) = env.get("WEB_URL") {
            self.http.cors_origins = vec![web_url.to_string()];
        }
        if env.get("ENABLE_SOCKETS").is_some() {
            self.sockets.enabled = env.sockets_enabled()?;
        }
        if env.mode_var().is_some() {
            self.mode = env.mode()?;
        }
        if let Some(addr) = env.get("BIND_ADDRESS").filter(|a| !a.is_empty()) {
            self.listener.bind_address = addr.to_string();
        }
        if let Some(dir) = env.get("LOG_DIR").filter(|d| !d.is_empty()) {
            self.observability.log_dir = Some(dir.to_string());
        }
        Ok(())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight work may run after stop is requested.
    pub grace_period_secs: u64,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 10,
        }
    }
}

/// HTTP middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Origins allowed by the CORS policy.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            body_limit_bytes: 100 * 1024, // 100KB
            request_timeout_secs: 30,
        }
    }
}

/// WebSocket channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Serve the socket registry.
    pub enabled: bool,

    /// Upgrade path for socket connections.
    pub path: String,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/ws".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,

    /// Directory for daily rolling log files.
    pub log_dir: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            log_dir: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("mode = \"development\"").unwrap();
        assert_eq!(config.mode, DeploymentMode::Development);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.sockets.path, "/ws");
        assert_eq!(config.shutdown.grace_period(), Duration::from_secs(10));
    }

    #[test]
    fn test_env_overlay() {
        let env = EnvConfig::from_lookup(&["WEB_URL"], |name| match name {
            "WEB_URL" => Some("https://example.org".into()),
            "ENABLE_SOCKETS" => Some("true".into()),
            "BIND_ADDRESS" => Some("127.0.0.1:4000".into()),
            _ => None,
        })
        .unwrap();

        let mut config = AppConfig::default();
        config.apply_env(&env).unwrap();

        assert_eq!(config.http.cors_origins, vec!["https://example.org"]);
        assert!(config.sockets.enabled);
        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
        assert_eq!(config.mode, DeploymentMode::Production);
    }
}
