use crate::{
    endpoint::EndpointState, engine::ScoringEngine, error::ScoringError,
    messages::InferenceRequest,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Base64 images quickly outgrow the extractor's default body limit.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Builds the scoring API on top of a running engine.
pub fn router(engine: Arc<ScoringEngine>, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(|| async { "Welcome to the scoring service!" }))
        .route("/status", get(get_status))
        .route("/score", post(post_score))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(engine)
}

/// Serves the scoring API on an already bound listener until the task is
/// cancelled or the listener fails.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<ScoringEngine>,
    body_limit: usize,
) -> std::io::Result<()> {
    log::info!("Listening on: {}", listener.local_addr()?);
    axum::serve(listener, router(engine, body_limit)).await
}

async fn get_status(State(engine): State<Arc<ScoringEngine>>) -> Response {
    // an engine only exists around a ready endpoint, but its thread may be gone
    if !engine.is_running() {
        log::warn!("Status requested while the inference thread is down");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "state": "stopped", "worker": engine.state().as_str() })),
        )
            .into_response();
    }

    Json(json!({
        "state": EndpointState::Ready.as_str(),
        "worker": engine.state().as_str(),
    }))
    .into_response()
}

async fn post_score(
    State(engine): State<Arc<ScoringEngine>>,
    Json(payload): Json<InferenceRequest>,
) -> Response {
    log::debug!("Received scoring request with {} images", payload.len());

    match engine.score(payload).await {
        Ok(reply) => {
            log::info!(
                "Scored request {} ({} images) in {:?}",
                reply.id,
                reply.images,
                reply.duration
            );
            // per-image failures are reported in the body, never in the status
            (StatusCode::OK, Json(reply.response)).into_response()
        }
        Err(e @ ScoringError::EngineStopped) => {
            log::error!("Scoring request rejected: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
