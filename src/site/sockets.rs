//! Socket events of the analytics site.
//!
//! Every recorded event is stored as a document and counted in the cache.
//! Payloads are checked against a typed shape before anything is written.

use serde::Deserialize;
use serde_json::Value;

use crate::app::{App, BootstrapError};
use crate::http::envelope::HandlerError;
use crate::module::{Cache, Store};
use crate::socket::SocketEvent;

/// Register the site's socket events on `app`.
pub fn register_sockets(app: &mut App) -> Result<(), BootstrapError> {
    app.register_socket("echo", echo)?
        .register_socket("page_view", page_view)?
        .register_socket("project_action", project_action)?
        .register_socket("client_error", client_error)?
        .register_socket("search_action", search_action)?;
    Ok(())
}

type Reply = Result<Option<Value>, HandlerError>;

async fn echo(event: SocketEvent) -> Reply {
    Ok(Some(event.payload))
}

#[derive(Debug, Deserialize)]
struct PageView {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ProjectAction {
    project: String,
    action: String,
}

#[derive(Debug, Deserialize)]
struct ClientError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchAction {
    query: String,
}

async fn page_view(event: SocketEvent) -> Reply {
    let view: PageView = event.payload_as()?;
    non_empty("path", &view.path)?;
    record(&event).await
}

async fn project_action(event: SocketEvent) -> Reply {
    let action: ProjectAction = event.payload_as()?;
    non_empty("project", &action.project)?;
    non_empty("action", &action.action)?;
    record(&event).await
}

async fn client_error(event: SocketEvent) -> Reply {
    let error: ClientError = event.payload_as()?;
    tracing::warn!(connection = %event.connection, message = %error.message, "Client reported error");
    record(&event).await
}

async fn search_action(event: SocketEvent) -> Reply {
    let search: SearchAction = event.payload_as()?;
    non_empty("query", &search.query)?;
    record(&event).await
}

fn non_empty(field: &str, value: &str) -> Result<(), HandlerError> {
    if value.trim().is_empty() {
        return Err(HandlerError::bad_request(format!("{field} must not be empty")));
    }
    Ok(())
}

async fn record(event: &SocketEvent) -> Reply {
    let store = event.ctx.require::<Store>()?;
    let cache = event.ctx.require::<Cache>()?;

    store
        .record_event(
            &event.event,
            Some(event.connection.to_string()),
            event.payload.clone(),
        )
        .await?;
    cache.incr(&event.event).await?;
    Ok(None)
}
