//! Redis-backed cache module.
//!
//! # Responsibilities
//! - Connect to Redis during initialize and verify with PING
//! - Attach a `Cache` capability wrapping a reconnecting connection manager
//!
//! # Design Decisions
//! - `ConnectionManager` is cheap to clone and reconnects on its own, so
//!   handlers clone it per call instead of sharing a lock
//! - All keys are namespaced with a prefix

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::context::ContextBuilder;
use crate::http::envelope::HandlerError;
use crate::module::{Module, ModuleError};

/// Shared Redis handle available to handlers.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    prefix: String,
}

impl Cache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn ping(&self) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Increment a counter, returning the new value.
    pub async fn incr(&self, key: &str) -> redis::RedisResult<i64> {
        let mut conn = self.conn.clone();
        conn.incr(self.key(key), 1).await
    }

    /// Current value of a counter; missing counters read as zero.
    pub async fn get_count(&self, key: &str) -> redis::RedisResult<i64> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(self.key(key)).await?;
        Ok(value.unwrap_or(0))
    }
}

impl From<redis::RedisError> for HandlerError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!(error = %err, "Cache operation failed");
        HandlerError::unavailable("Cache unavailable")
    }
}

/// Module attaching a [`Cache`] capability.
pub struct CacheModule {
    url: String,
    prefix: String,
}

impl CacheModule {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: "app:".to_string(),
        }
    }

    /// Override the key prefix (default `app:`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

#[async_trait]
impl Module for CacheModule {
    fn name(&self) -> &str {
        "cache"
    }

    async fn initialize(&self, ctx: &mut ContextBuilder) -> Result<(), ModuleError> {
        let connection_error = |e: redis::RedisError| ModuleError::Connection {
            target: "redis".to_string(),
            reason: e.to_string(),
        };

        let client = redis::Client::open(self.url.as_str()).map_err(connection_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(connection_error)?;

        let cache = Cache::new(conn, self.prefix.clone());
        cache.ping().await.map_err(connection_error)?;

        tracing::info!(prefix = %self.prefix, "Connected to Redis");
        ctx.insert("cache", cache)?;
        Ok(())
    }
}
