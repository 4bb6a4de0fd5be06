use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::ingest::ExampleInput;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub examples: Vec<ExampleInput>,
    #[serde(default)]
    pub replace_all: bool,
}

pub async fn count_examples(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let count = state.store.count().await?;
    Ok(Json(json!({
        "backend": state.store.backend_name(),
        "count": count,
    })))
}

pub async fn ingest_examples(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IngestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let report = state
        .ingestor
        .upsert_batch(payload.examples, payload.replace_all)
        .await?;
    Ok(Json(report))
}

pub async fn clear_examples(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let removed = state.store.clear().await?;
    tracing::info!("Cleared {} examples", removed);
    Ok(Json(json!({"removed": removed})))
}

pub async fn get_example(
    State(state): State<Arc<AppState>>,
    Path(example_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.store.get(&example_id).await? {
        Some(example) => Ok(Json(example)),
        None => Err(ApiError::NotFound(format!("example {}", example_id))),
    }
}

pub async fn delete_example(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(example_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    if state.store.delete(&example_id).await? {
        Ok(Json(json!({"deleted": example_id})))
    } else {
        Err(ApiError::NotFound(format!("example {}", example_id)))
    }
}
