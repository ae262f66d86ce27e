use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use dealflow_shared::{CycleRecord, StatsSummary};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 500;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/stats/cycles", get(list_cycles))
        .route("/stats/summary", get(summary))
        .route("/metrics", get(metrics))
}

#[derive(Debug, Deserialize)]
pub struct CyclesQuery {
    pub limit: Option<usize>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Most recent cycle records, newest first. `limit` is capped at 500.
async fn list_cycles(
    State(state): State<AppState>,
    Query(query): Query<CyclesQuery>,
) -> Result<Json<Vec<CycleRecord>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err(AppError::ValidationError("limit must be at least 1".into()));
    }
    let records = state
        .stats
        .recent(limit.min(MAX_LIMIT))
        .await
        .map_err(AppError::stats)?;
    Ok(Json(records))
}

async fn summary(State(state): State<AppState>) -> Result<Json<StatsSummary>, AppError> {
    let summary = state.stats.summary().await.map_err(AppError::stats)?;
    Ok(Json(summary))
}

async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
