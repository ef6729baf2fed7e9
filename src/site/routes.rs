//! HTTP routes of the analytics site.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{body::Body, http::Request};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::DeploymentMode;
use crate::context::Context;
use crate::http::envelope::{Envelope, HandlerError};
use crate::module::store::EventRecord;
use crate::module::{Cache, Store};
use crate::routing::Routes;
use crate::site::EVENT_KINDS;

/// How many events the development listings return.
const RECENT_LIMIT: i64 = 50;

/// Mount the site routes.
pub fn register_routes(r: &mut Routes) {
    r.get("/", hello)
        .get("/health", health)
        .get("/stats", stats)
        .only_in(DeploymentMode::Development, |r| {
            r.get("/dev/errors", dev_errors)
                .get("/dev/stats", dev_stats)
                .get("/dev/searches", dev_searches);
        });
}

type Reply = Result<Envelope<Value>, HandlerError>;

async fn hello(_ctx: Arc<Context>, _req: Request<Body>) -> Reply {
    Ok(Envelope::data(json!({ "msg": "Hello, world!" })))
}

async fn health(ctx: Arc<Context>, _req: Request<Body>) -> Reply {
    let cache = ctx.require::<Cache>()?;
    let store = ctx.require::<Store>()?;
    cache.ping().await?;
    store.ping().await?;
    Ok(Envelope::data(json!({ "cache": "ok", "store": "ok" })))
}

async fn stats(ctx: Arc<Context>, _req: Request<Body>) -> Reply {
    let store = ctx.require::<Store>()?;
    let counts: BTreeMap<String, i64> = store.counts_by_kind().await?.into_iter().collect();
    Ok(Envelope::data(json!({ "events": counts })))
}

async fn dev_errors(ctx: Arc<Context>, _req: Request<Body>) -> Reply {
    recent(&ctx, "client_error").await
}

async fn dev_searches(ctx: Arc<Context>, _req: Request<Body>) -> Reply {
    recent(&ctx, "search_action").await
}

/// Live counters next to the stored totals.
async fn dev_stats(ctx: Arc<Context>, _req: Request<Body>) -> Reply {
    let cache = ctx.require::<Cache>()?;
    let store = ctx.require::<Store>()?;

    let mut counters = BTreeMap::new();
    let mut stored = BTreeMap::new();
    for kind in EVENT_KINDS {
        counters.insert(kind, cache.get_count(kind).await?);
        stored.insert(kind, store.count_events(kind).await?);
    }
    Ok(Envelope::data(json!({ "counters": counters, "stored": stored })))
}

async fn recent(ctx: &Context, kind: &str) -> Reply {
    let store = ctx.require::<Store>()?;
    let events: Vec<EventView> = store
        .recent_events(kind, RECENT_LIMIT)
        .await?
        .into_iter()
        .map(EventView::from)
        .collect();
    Ok(Envelope::data(serde_json::to_value(events)?))
}

/// JSON shape of a stored event.
#[derive(Debug, Serialize)]
struct EventView {
    kind: String,
    connection: Option<String>,
    payload: Value,
    created_at: String,
}

impl From<EventRecord> for EventView {
    fn from(record: EventRecord) -> Self {
        Self {
            created_at: record.created_at.try_to_rfc3339_string().unwrap_or_default(),
            kind: record.kind,
            connection: record.connection,
            payload: record.payload,
        }
    }
}
