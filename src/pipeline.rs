//! Request-scoped orchestration: retrieve, format, generate and validate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::cancel::CancelToken;
use crate::core::errors::RagError;
use crate::generation::{GenerationAttempt, GenerationJob, GenerationLoop};
use crate::prompt::{current_publish_cycle, format_context};
use crate::retrieval::{RetrievalContext, RetrievalSummary, Retriever};
use crate::store::MetadataFilter;
use crate::text::{lint_script, ScriptLint};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptRequest {
    pub requirement_text: String,
    #[serde(default)]
    pub target_schema: Option<String>,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Overrides the month tag substituted for `PUBLISH_CYCLE`.
    #[serde(default)]
    pub publish_cycle: Option<String>,
}

impl ScriptRequest {
    pub fn new(requirement_text: impl Into<String>) -> Self {
        Self {
            requirement_text: requirement_text.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), RagError> {
        if self.requirement_text.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "requirement_text must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub generated_text: Option<String>,
    pub comparator_score: Option<f32>,
    pub differences: Vec<String>,
    pub attempts_used: u32,
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub last_attempt: Option<GenerationAttempt>,
    /// On failure, the latest attempt that produced a script. Score,
    /// differences and lint describe this attempt when it is present.
    pub best_effort: Option<GenerationAttempt>,
    pub retrieval: RetrievalSummary,
    pub lint: Option<ScriptLint>,
}

impl GenerationResponse {
    fn failure(err: &RagError, retrieval: RetrievalSummary) -> Self {
        let (attempts_used, last_attempt, best_effort) = match err {
            RagError::RetriesExhausted(report) => (
                report.attempts_used,
                Some(report.last_attempt.clone()),
                report.best_effort().cloned(),
            ),
            RagError::Cancelled {
                attempts_used,
                last_attempt,
            }
            | RagError::RequestTimeout {
                attempts_used,
                last_attempt,
            } => {
                let last_attempt = last_attempt.as_deref().cloned();
                let best_effort = last_attempt
                    .clone()
                    .filter(|attempt| !attempt.generated_text.is_empty());
                (*attempts_used, last_attempt, best_effort)
            }
            _ => (0, None, None),
        };

        let detail = best_effort.as_ref().or(last_attempt.as_ref());
        let lint = best_effort
            .as_ref()
            .map(|attempt| lint_script(&attempt.generated_text));

        Self {
            success: false,
            generated_text: None,
            comparator_score: detail.map(|attempt| attempt.comparator_score),
            differences: detail
                .map(|attempt| attempt.differences.clone())
                .unwrap_or_default(),
            attempts_used,
            error_kind: Some(err.kind().to_string()),
            error: Some(err.to_string()),
            last_attempt,
            best_effort,
            retrieval,
            lint,
        }
    }
}

pub struct ScriptPipeline {
    retriever: Arc<Retriever>,
    generation_loop: Arc<GenerationLoop>,
}

impl ScriptPipeline {
    pub fn new(retriever: Arc<Retriever>, generation_loop: Arc<GenerationLoop>) -> Self {
        Self {
            retriever,
            generation_loop,
        }
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    pub async fn retrieve(&self, request: &ScriptRequest) -> Result<RetrievalContext, RagError> {
        request.validate()?;
        Ok(self
            .retriever
            .retrieve(
                &request.requirement_text,
                request.max_results.unwrap_or(0),
                request.filter.as_ref(),
            )
            .await)
    }

    /// Runs the whole pipeline for one requirement.
    ///
    /// Only invalid input is returned as `Err`; every generation outcome,
    /// including failures, is reported through [`GenerationResponse`].
    pub async fn generate(
        &self,
        request: ScriptRequest,
        cancel: &CancelToken,
    ) -> Result<GenerationResponse, RagError> {
        let context = self.retrieve(&request).await?;
        let retrieval = context.summary();

        let Some(reference) = context.reference() else {
            let err = RagError::NoReferenceExample {
                candidates: context.all_results().len(),
                best_similarity: context.best_similarity(),
            };
            tracing::warn!("{}", err);
            return Ok(GenerationResponse::failure(&err, retrieval));
        };

        tracing::info!(
            "Using reference example {} (similarity {:.3})",
            reference.example.id,
            reference.similarity
        );

        let job = GenerationJob {
            formatted_context: format_context(
                &reference.example,
                context.query_text(),
                request.target_schema.as_deref(),
            ),
            reference_solution: reference.example.solution_text.clone(),
            publish_cycle: request
                .publish_cycle
                .clone()
                .filter(|cycle| !cycle.trim().is_empty())
                .unwrap_or_else(current_publish_cycle),
        };

        match self.generation_loop.run(&job, cancel).await {
            Ok(accepted) => {
                let lint = lint_script(&accepted.generated_text);
                if !lint.is_valid {
                    tracing::warn!("Accepted script has lint issues: {:?}", lint.issues);
                }
                Ok(GenerationResponse {
                    success: true,
                    last_attempt: accepted.attempts.last().cloned(),
                    best_effort: None,
                    generated_text: Some(accepted.generated_text),
                    comparator_score: Some(accepted.comparator_score),
                    differences: accepted.differences,
                    attempts_used: accepted.attempts_used,
                    error_kind: None,
                    error: None,
                    retrieval,
                    lint: Some(lint),
                })
            }
            Err(err) => {
                tracing::warn!("Generation failed: {}", err);
                Ok(GenerationResponse::failure(&err, retrieval))
            }
        }
    }
}
