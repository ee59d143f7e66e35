//! HTTP listener for chat events pushed by the chat bridge.
//!
//! `POST /events` takes one JSON [`ChatEvent`] and answers with the outcome
//! label once the event has been dispatched. `GET /healthz` answers `ok`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::chat::{ChatDispatcher, ChatEvent, ChatOutcome};
use crate::EngineError;

/// A running chat event listener.
pub struct ChatEventServer {
    local_addr: SocketAddr,
    join: JoinHandle<()>,
}

impl ChatEventServer {
    /// Bind `addr` and serve until `shutdown_rx` fires.
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: Arc<ChatDispatcher>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<Self, EngineError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let app = router(dispatcher);

        let join = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!("chat event listener failed: {e}");
            }
        });
        tracing::info!(%local_addr, "chat event listener started");
        Ok(Self { local_addr, join })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the listener to drain after shutdown.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            tracing::warn!("chat event listener ended abnormally: {e}");
        }
    }
}

fn router(dispatcher: Arc<ChatDispatcher>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/events", post(events))
        .with_state(dispatcher)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn events(
    State(dispatcher): State<Arc<ChatDispatcher>>,
    Json(event): Json<ChatEvent>,
) -> (StatusCode, Json<Value>) {
    let outcome = dispatcher.dispatch(event).await;
    let mut body = json!({ "ok": true, "outcome": outcome.label() });
    match &outcome {
        ChatOutcome::Invoiced(record) | ChatOutcome::Cancelled(record) => {
            body["service_id"] = json!(record.id.get());
        }
        ChatOutcome::Rejected(e) => {
            body["ok"] = json!(false);
            body["error"] = json!(e.to_string());
        }
        _ => {}
    }
    (StatusCode::OK, Json(body))
}
