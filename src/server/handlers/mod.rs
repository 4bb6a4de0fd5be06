pub mod config;
pub mod examples;
pub mod generate;
pub mod health;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, HeaderValue};
    use axum::Json;
    use serde_json::json;

    use super::{config, examples};
    use crate::core::config::{AppPaths, ConfigService, Settings};
    use crate::core::errors::{ApiError, RagError};
    use crate::core::security::{SessionToken, API_KEY_HEADER};
    use crate::embedding::HashingEmbedder;
    use crate::generation::{ComparatorService, GenerationService, ValidationVerdict};
    use crate::ingest::ExampleInput;
    use crate::state::AppState;
    use crate::store::MemoryExampleStore;

    struct Idle;

    #[async_trait]
    impl GenerationService for Idle {
        async fn complete(&self, _prompt: &str) -> Result<String, RagError> {
            Err(RagError::GenerationService("idle".to_string()))
        }
    }

    #[async_trait]
    impl ComparatorService for Idle {
        async fn compare(&self, _: &str, _: &str) -> Result<ValidationVerdict, RagError> {
            Err(RagError::ComparatorService("idle".to_string()))
        }
    }

    fn state(dir: &std::path::Path) -> Arc<AppState> {
        let paths = Arc::new(AppPaths::with_data_dir(dir.to_path_buf(), dir.join("data")));
        AppState::assemble(
            paths.clone(),
            ConfigService::new(paths),
            Settings::default(),
            SessionToken::new("s3cret"),
            Arc::new(MemoryExampleStore::new()),
            Arc::new(HashingEmbedder::new(32)),
            Arc::new(Idle),
            Arc::new(Idle),
            Vec::new(),
        )
    }

    fn payload() -> examples::IngestPayload {
        examples::IngestPayload {
            examples: vec![ExampleInput {
                requirement_text: "Dealer payout".to_string(),
                solution_text: "SELECT a FROM t;".to_string(),
                ..ExampleInput::default()
            }],
            replace_all: false,
        }
    }

    fn keyed(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn mutating_routes_require_the_session_token() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let denied = examples::ingest_examples(State(state.clone()), HeaderMap::new(), Json(payload())).await;
        assert!(matches!(denied, Err(ApiError::Unauthorized)));
        let denied = examples::clear_examples(State(state.clone()), keyed("wrong")).await;
        assert!(matches!(denied, Err(ApiError::Unauthorized)));
        let denied = examples::delete_example(
            State(state.clone()),
            HeaderMap::new(),
            Path("missing".to_string()),
        )
        .await;
        assert!(matches!(denied, Err(ApiError::Unauthorized)));
        assert_eq!(state.store.count().await.unwrap(), 0);

        assert!(examples::ingest_examples(State(state.clone()), keyed("s3cret"), Json(payload()))
            .await
            .is_ok());
        assert_eq!(state.store.count().await.unwrap(), 1);
        assert!(examples::clear_examples(State(state.clone()), keyed("s3cret")).await.is_ok());
        assert_eq!(state.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn config_routes_require_the_session_token() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let redirect = json!({"generation": {"base_url": "http://attacker.invalid"}});

        let denied = config::get_config(State(state.clone()), HeaderMap::new()).await;
        assert!(matches!(denied, Err(ApiError::Unauthorized)));
        let denied =
            config::update_config(State(state.clone()), HeaderMap::new(), Json(redirect.clone()))
                .await;
        assert!(matches!(denied, Err(ApiError::Unauthorized)));
        let denied = config::patch_config(State(state.clone()), keyed("wrong"), Json(redirect)).await;
        assert!(matches!(denied, Err(ApiError::Unauthorized)));

        assert!(config::get_config(State(state), keyed("s3cret")).await.is_ok());
    }
}
