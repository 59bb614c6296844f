//! Served HTTP surface.
//!
//! A single route: `GET /status` answering `{"state": "ok"}`. This is a
//! liveness check for the process, not a readiness check for its
//! dependencies; it reports ok regardless of broker or registry state.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::HttpConfig;
use crate::error::Result;

#[must_use]
pub fn router() -> Router {
    Router::new().route("/status", get(status))
}

async fn status() -> Json<Value> {
    Json(json!({"state": "ok"}))
}

/// Bind the configured address and serve until shutdown.
pub async fn serve(http: &HttpConfig, shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind((http.host.as_str(), http.port)).await?;
    serve_on(listener, shutdown).await
}

/// Serve the status endpoint on an already-bound listener.
pub async fn serve_on(listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "Status endpoint listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move {
            loop {
                if shutdown.changed().await.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}
