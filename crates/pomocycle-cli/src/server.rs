//! HTTP status endpoint.
//!
//! Serves the current [`StatusReport`] as JSON for overlays such as an OBS
//! browser source, plus a small self-refreshing overlay page at `/`.

use std::future::Future;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use pomocycle_core::timer::{StateReader, StatusReport};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const OVERLAY_HTML: &str = include_str!("../assets/overlay.html");

/// Build the router. Each request takes its own snapshot; nothing here can
/// block the cycle driver.
pub fn build_router(reader: StateReader) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(overlay))
        .route("/status", get(status))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(reader)
}

async fn status(State(reader): State<StateReader>) -> Json<StatusReport> {
    Json(reader.status())
}

async fn health() -> &'static str {
    "ok"
}

async fn overlay() -> Html<&'static str> {
    Html(OVERLAY_HTML)
}

pub async fn serve<F>(reader: StateReader, addr: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "status server listening");
    axum::serve(listener, build_router(reader))
        .with_graceful_shutdown(shutdown)
        .await
}
