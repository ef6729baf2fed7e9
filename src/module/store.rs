//! MongoDB-backed document store module.
//!
//! # Responsibilities
//! - Connect to MongoDB during initialize and verify with a ping command
//! - Attach a `Store` capability for recording and querying events
//! - Shut the client down during teardown
//!
//! # Design Decisions
//! - The driver pools connections internally; `Store` is shared as-is
//! - Database comes from the URI path, falling back to a configured name

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, DateTime},
    Client, Collection, Database,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{Context, ContextBuilder};
use crate::http::envelope::HandlerError;
use crate::module::{Module, ModuleError};

const EVENTS: &str = "events";

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Store operation failed");
        HandlerError::unavailable("Store unavailable")
    }
}

/// One recorded analytics event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime,
}

/// Shared MongoDB handle available to handlers.
#[derive(Clone, Debug)]
pub struct Store {
    client: Client,
    database: Database,
}

impl Store {
    pub fn new(client: Client, database: Database) -> Self {
        Self { client, database }
    }

    fn events(&self) -> Collection<EventRecord> {
        self.database.collection(EVENTS)
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    /// Append an event document.
    pub async fn record_event(
        &self,
        kind: &str,
        connection: Option<String>,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        let record = EventRecord {
            kind: kind.to_string(),
            connection,
            payload,
            created_at: DateTime::now(),
        };
        self.events().insert_one(record).await?;
        Ok(())
    }

    pub async fn count_events(&self, kind: &str) -> Result<u64, StoreError> {
        Ok(self.events().count_documents(doc! { "kind": kind }).await?)
    }

    /// Event counts grouped by kind.
    pub async fn counts_by_kind(&self) -> Result<Vec<(String, i64)>, StoreError> {
        let pipeline = vec![
            doc! { "$group": { "_id": "$kind", "count": { "$sum": 1 } } },
            doc! { "$sort": { "_id": 1 } },
        ];
        let mut cursor = self.events().aggregate(pipeline).await?;

        let mut counts = Vec::new();
        while let Some(row) = cursor.try_next().await? {
            let kind = row.get_str("_id").unwrap_or("unknown").to_string();
            let count = match row.get("count") {
                Some(Bson::Int32(n)) => i64::from(*n),
                Some(Bson::Int64(n)) => *n,
                _ => 0,
            };
            counts.push((kind, count));
        }
        Ok(counts)
    }

    /// Most recent events of `kind`, newest first.
    pub async fn recent_events(&self, kind: &str, limit: i64) -> Result<Vec<EventRecord>, StoreError> {
        let cursor = self
            .events()
            .find(doc! { "kind": kind })
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn shutdown(&self) {
        self.client.clone().shutdown().await;
    }
}

/// Module attaching a [`Store`] capability.
pub struct StoreModule {
    uri: String,
    database: String,
}

impl StoreModule {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: "analytics".to_string(),
        }
    }

    /// Database used when the URI names none (default `analytics`).
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}

#[async_trait]
impl Module for StoreModule {
    fn name(&self) -> &str {
        "store"
    }

    async fn initialize(&self, ctx: &mut ContextBuilder) -> Result<(), ModuleError> {
        let connection_error = |e: mongodb::error::Error| ModuleError::Connection {
            target: "mongodb".to_string(),
            reason: e.to_string(),
        };

        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(connection_error)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(&self.database));

        let store = Store::new(client, database);
        store.ping().await.map_err(|e| match e {
            StoreError::Mongo(e) => connection_error(e),
        })?;

        tracing::info!(database = %store.database_name(), "Connected to MongoDB");
        ctx.insert("store", store)?;
        Ok(())
    }

    async fn teardown(&self, ctx: &Context) -> Result<(), ModuleError> {
        if let Some(store) = ctx.get::<Store>() {
            store.shutdown().await;
            tracing::info!("MongoDB client shut down");
        }
        Ok(())
    }
}
