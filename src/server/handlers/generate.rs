use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::Instrument;

use crate::core::cancel::CancelToken;
use crate::core::errors::ApiError;
use crate::pipeline::{GenerationResponse, ScriptRequest};
use crate::state::AppState;

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScriptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let context = state.pipeline.retrieve(&request).await?;
    Ok(Json(json!({
        "query_text": context.query_text(),
        "retrieval": context.summary(),
        "results": context.all_results(),
    })))
}

/// Generation outcomes, failures included, are returned with status 200.
///
/// If the client goes away the handler future is dropped, which cancels the
/// in-flight generation through the guard.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScriptRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let cancel = CancelToken::new();
    let guard = cancel.drop_guard();
    let request_id = uuid::Uuid::new_v4();
    let response = state
        .pipeline
        .generate(request, &cancel)
        .instrument(tracing::info_span!("generate", %request_id))
        .await?;
    guard.disarm();
    Ok(Json(response))
}
