//! Relay server
//!
//! Bridges a browser page to a timer running outside it. The page loads
//! the embed loader from `/embed.js`; the loader forwards the widget's
//! lifecycle messages to `/messages`, which posts them on the bus the
//! mounted timer listens to.
//!
//! The loader posts with `mode: "no-cors"` and a `text/plain` body so no
//! preflight is needed; `/messages` therefore parses the raw body itself.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::embed::{InboundMessage, MessageBus, ScriptRegistry};
use crate::error::{Result, SessionTimingError};
use crate::timer::{SessionTimer, TimerSnapshot};

/// Shared handles the routes work against.
#[derive(Clone)]
pub struct RelayState {
    /// Bus inbound messages are posted to.
    pub bus: Arc<MessageBus>,
    /// Page serving the injected loader.
    pub page: Arc<ScriptRegistry>,
    /// Timer whose state `/session` reports.
    pub timer: Arc<SessionTimer>,
}

/// Build the relay routes.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/messages", post(post_message))
        .route("/embed.js", get(embed_script))
        .route("/session", get(session))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

async fn post_message(State(state): State<RelayState>, body: String) -> Response {
    match serde_json::from_str::<InboundMessage>(&body) {
        Ok(message) => {
            let delivered = state.bus.post(message);
            debug!(delivered, "Relayed inbound message");
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => {
            debug!(error = %e, "Rejected malformed inbound message");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

async fn embed_script(State(state): State<RelayState>) -> Response {
    match state.page.current_script() {
        Some(source) => (
            [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
            source,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn session(State(state): State<RelayState>) -> Json<TimerSnapshot> {
    Json(state.timer.snapshot())
}

/// Serve the relay on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns `SessionTimingError::Server` if serving fails.
pub async fn serve<F>(listener: TcpListener, state: RelayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Relay server listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SessionTimingError::Server(e.to_string()))?;

    info!("Relay server stopped");
    Ok(())
}
