use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let (example_count, store_error) = match state.store.count().await {
        Ok(count) => (Some(count), None),
        Err(err) => {
            tracing::warn!("Example store unavailable for status: {}", err);
            (None, Some(err.to_string()))
        }
    };

    let mut providers = Vec::with_capacity(state.providers.len());
    for handle in &state.providers {
        let reachable = handle.provider.health_check().await.unwrap_or(false);
        providers.push(json!({
            "role": handle.role,
            "provider": handle.provider.name(),
            "model": handle.provider.model(),
            "reachable": reachable,
        }));
    }

    let settings = serde_json::to_value(state.settings.as_ref()).map_err(ApiError::internal)?;
    let retriever = state.pipeline.retriever().config();

    Ok(Json(json!({
        "store": {
            "backend": state.store.backend_name(),
            "example_count": example_count,
            "error": store_error,
        },
        "embedding_model": state.embedder.model_id(),
        "providers": providers,
        "rag": {
            "max_results": retriever.max_results,
            "confidence_threshold": retriever.confidence_threshold,
            "filter_fallback": retriever.filter_fallback,
        },
        "settings": state.config.redact_sensitive_values(&settings),
    })))
}
