use crate::app::dto::*;
use crate::app::engine::RootScoutEngine;
use crate::domain::telemetry::{ChangeEvent, NormalizedTelemetryRecord};
use crate::error::{GraphError, IngestError};
use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct HttpState {
    pub engine: RootScoutEngine,
}

#[derive(Debug, Clone, serde::Serialize)]
struct ApiErrorBody {
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> impl IntoResponse {
    (status, Json(ApiErrorBody { error: msg.into() }))
}

/// Unknown services are 404, malformed records 400, anything else 500.
fn status_for(err: &anyhow::Error) -> StatusCode {
    if let Some(GraphError::ServiceNotFound { .. }) = err.downcast_ref::<GraphError>() {
        StatusCode::NOT_FOUND
    } else if err.downcast_ref::<IngestError>().is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub fn build_router(engine: RootScoutEngine) -> Router {
    let state = Arc::new(HttpState { engine });

    Router::new()
        .route("/healthz", get(healthz))
        .route("/graph/status", get(graph_status))
        .route("/ingest/telemetry", post(ingest_telemetry))
        .route("/ingest/changes", post(ingest_changes))
        .route("/context", post(context))
        .route("/analyze", post(analyze))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(engine: RootScoutEngine, addr: SocketAddr) -> Result<()> {
    let app = build_router(engine);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.engine.healthz())
}

async fn graph_status(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let engine = state.engine.clone();
    match spawn_blocking(move || engine.status()).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        )
        .into_response(),
    }
}

async fn ingest_telemetry(
    State(state): State<Arc<HttpState>>,
    Json(records): Json<Vec<NormalizedTelemetryRecord>>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    match spawn_blocking(move || engine.ingest_records(&records)).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        )
        .into_response(),
    }
}

async fn ingest_changes(
    State(state): State<Arc<HttpState>>,
    Json(changes): Json<Vec<ChangeEvent>>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    match spawn_blocking(move || engine.ingest_changes(&changes)).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        )
        .into_response(),
    }
}

async fn context(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ContextRequest>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    match spawn_blocking(move || engine.get_context(&req.service)).await {
        Ok(Ok(res)) => Json(res).into_response(),
        Ok(Err(e)) => api_error(status_for(&e), e.to_string()).into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        )
        .into_response(),
    }
}

async fn analyze(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ContextRequest>,
) -> impl IntoResponse {
    let engine = state.engine.clone();
    match spawn_blocking(move || engine.analyze(&req.service)).await {
        Ok(Ok(res)) => Json(res).into_response(),
        Ok(Err(e)) => api_error(status_for(&e), format!("{e:#}")).into_response(),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        )
        .into_response(),
    }
}
