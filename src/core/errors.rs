use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::generation::types::{ExhaustedReport, GenerationAttempt};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Errors raised by the retrieval and generation engine.
///
/// Per-attempt variants (`GenerationService`, `ComparatorService`,
/// `ComparatorParse`) are absorbed by the generation loop; only the
/// request-level variants reach callers.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("example store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("no reference example found ({candidates} candidates, best similarity {best_similarity:.3})")]
    NoReferenceExample {
        candidates: usize,
        best_similarity: f32,
    },
    #[error("embedding service error: {0}")]
    Embedding(String),
    #[error("generation service error: {0}")]
    GenerationService(String),
    #[error("comparator service error: {0}")]
    ComparatorService(String),
    #[error("comparator reply could not be parsed: {0}")]
    ComparatorParse(String),
    #[error("retries exhausted after {} attempts", .0.attempts_used)]
    RetriesExhausted(Box<ExhaustedReport>),
    #[error("request cancelled after {attempts_used} attempts")]
    Cancelled {
        attempts_used: u32,
        last_attempt: Option<Box<GenerationAttempt>>,
    },
    #[error("request deadline exceeded after {attempts_used} attempts")]
    RequestTimeout {
        attempts_used: u32,
        last_attempt: Option<Box<GenerationAttempt>>,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::StoreUnavailable(err.to_string())
    }

    /// Stable snake_case tag surfaced to callers as `error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::StoreUnavailable(_) => "store_unavailable",
            RagError::NoReferenceExample { .. } => "no_reference_example",
            RagError::Embedding(_) => "embedding_error",
            RagError::GenerationService(_) => "generation_service_error",
            RagError::ComparatorService(_) => "comparator_service_error",
            RagError::ComparatorParse(_) => "comparator_parse_error",
            RagError::RetriesExhausted(_) => "retries_exhausted",
            RagError::Cancelled { .. } => "cancelled",
            RagError::RequestTimeout { .. } => "request_timeout",
            RagError::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidInput(msg) => ApiError::BadRequest(msg),
            RagError::StoreUnavailable(_) | RagError::Embedding(_) => {
                ApiError::Unavailable(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
