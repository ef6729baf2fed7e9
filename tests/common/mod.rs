//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app_bootstrap::config::{AppConfig, DeploymentMode};
use app_bootstrap::context::{Context, ContextBuilder};
use app_bootstrap::module::{Module, ModuleError};
use async_trait::async_trait;

/// Ordered record of lifecycle calls across modules.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Capability attached by [`FakeModule`].
#[derive(Debug)]
pub struct Greeting(pub String);

/// In-test module standing in for an external service.
pub struct FakeModule {
    name: String,
    journal: Journal,
    fail_init: bool,
    fail_teardown: bool,
    greeting: Option<String>,
}

impl FakeModule {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            fail_init: false,
            fail_teardown: false,
            greeting: None,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    /// Attach a [`Greeting`] capability during initialize.
    pub fn greeting(mut self, text: &str) -> Self {
        self.greeting = Some(text.to_string());
        self
    }
}

#[async_trait]
impl Module for FakeModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, ctx: &mut ContextBuilder) -> Result<(), ModuleError> {
        self.journal.push(format!("init:{}", self.name));
        if self.fail_init {
            return Err(ModuleError::Connection {
                target: self.name.clone(),
                reason: "connection refused".into(),
            });
        }
        if let Some(text) = &self.greeting {
            ctx.insert(format!("{}-greeting", self.name), Greeting(text.clone()))?;
        }
        Ok(())
    }

    async fn teardown(&self, _ctx: &Context) -> Result<(), ModuleError> {
        self.journal.push(format!("teardown:{}", self.name));
        if self.fail_teardown {
            return Err(ModuleError::Failed("teardown refused".into()));
        }
        Ok(())
    }
}

/// Configuration bound to an ephemeral local port.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.mode = DeploymentMode::Test;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.shutdown.grace_period_secs = 1;
    config
}

/// A port that was free a moment ago.
pub fn free_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// HTTP client without pooling, so stop() is not held open by idle connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}
