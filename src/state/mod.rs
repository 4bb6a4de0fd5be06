use std::sync::Arc;
use std::time::Duration;

use crate::core::config::settings::{EmbeddingBackend, StoreBackend};
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::security::{init_session_token, SessionToken};
use crate::embedding::{Embedder, HashingEmbedder, HttpEmbedder};
use crate::generation::{ComparatorService, GenerationLoop, GenerationService, LoopPolicy};
use crate::ingest::Ingestor;
use crate::llm::{build_provider, LlmComparator, LlmGenerator, LlmProvider};
use crate::pipeline::ScriptPipeline;
use crate::retrieval::{Retriever, RetrieverConfig};
use crate::store::{ExampleStore, MemoryExampleStore, SqliteExampleStore};

pub mod error;

use error::InitializationError;

/// A chat provider together with the role it serves, for status reporting.
#[derive(Clone)]
pub struct ProviderHandle {
    pub role: &'static str,
    pub provider: Arc<dyn LlmProvider>,
}

/// Global application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub session_token: SessionToken,
    pub store: Arc<dyn ExampleStore>,
    pub embedder: Arc<dyn Embedder>,
    pub ingestor: Arc<Ingestor>,
    pub pipeline: Arc<ScriptPipeline>,
    pub providers: Vec<ProviderHandle>,
}

impl AppState {
    /// Builds the store, embedder and providers described by `settings`.
    pub async fn initialize(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        let store: Arc<dyn ExampleStore> = match settings.store.backend {
            StoreBackend::Sqlite => {
                let db_path = settings
                    .store
                    .path
                    .clone()
                    .unwrap_or_else(|| paths.db_path.clone());
                Arc::new(
                    SqliteExampleStore::with_path(db_path)
                        .await
                        .map_err(|e| InitializationError::Store(e.into()))?,
                )
            }
            StoreBackend::Memory => Arc::new(MemoryExampleStore::new()),
        };

        let embedder: Arc<dyn Embedder> = match settings.embedding.provider {
            EmbeddingBackend::Hashing => {
                Arc::new(HashingEmbedder::new(settings.embedding.dimensions))
            }
            EmbeddingBackend::Http => Arc::new(
                HttpEmbedder::new(
                    settings.embedding.base_url.clone(),
                    settings.embedding.model.clone(),
                    settings.embedding.api_key.clone(),
                    Duration::from_secs(settings.embedding.timeout_secs),
                )
                .map_err(|e| InitializationError::Embedding(e.into()))?,
            ),
        };

        let generation_settings = settings.generation.clone();
        let comparator_settings = settings.comparator_settings().clone();
        let generation_provider = build_provider(&generation_settings)
            .map_err(|e| InitializationError::Llm(e.into()))?;
        let comparator_provider = build_provider(&comparator_settings)
            .map_err(|e| InitializationError::Llm(e.into()))?;

        tracing::info!(
            "Generation via {} ({}), comparator via {} ({})",
            generation_provider.name(),
            generation_provider.model(),
            comparator_provider.name(),
            comparator_provider.model()
        );

        let generator: Arc<dyn GenerationService> = Arc::new(LlmGenerator::new(
            generation_provider.clone(),
            generation_settings,
        ));
        let comparator: Arc<dyn ComparatorService> = Arc::new(LlmComparator::new(
            comparator_provider.clone(),
            comparator_settings,
        ));

        let providers = vec![
            ProviderHandle {
                role: "generation",
                provider: generation_provider,
            },
            ProviderHandle {
                role: "comparator",
                provider: comparator_provider,
            },
        ];

        let session_token = init_session_token(&paths);

        Ok(Self::assemble(
            paths,
            config,
            settings,
            session_token,
            store,
            embedder,
            generator,
            comparator,
            providers,
        ))
    }

    /// Wires already-built components into a state. Also used by tests.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        session_token: SessionToken,
        store: Arc<dyn ExampleStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn GenerationService>,
        comparator: Arc<dyn ComparatorService>,
        providers: Vec<ProviderHandle>,
    ) -> Arc<Self> {
        let retriever = Arc::new(Retriever::new(
            store.clone(),
            embedder.clone(),
            RetrieverConfig::from(&settings.rag),
        ));
        let generation_loop = Arc::new(GenerationLoop::new(
            generator,
            comparator,
            LoopPolicy::from(&settings.generation_loop),
        ));
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            embedder.clone(),
            settings.rag.ingest_batch_size,
        ));

        Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            session_token,
            store,
            embedder,
            ingestor,
            pipeline: Arc::new(ScriptPipeline::new(retriever, generation_loop)),
            providers,
        })
    }
}
