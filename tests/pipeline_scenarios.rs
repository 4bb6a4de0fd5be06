use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use exemplar_backend::core::cancel::CancelToken;
use exemplar_backend::core::errors::RagError;
use exemplar_backend::embedding::{Embedder, HashingEmbedder};
use exemplar_backend::generation::{
    ComparatorService, GenerationLoop, GenerationService, LoopPolicy, ValidationVerdict,
    MAX_RETRIES,
};
use exemplar_backend::ingest::{ExampleInput, Ingestor};
use exemplar_backend::pipeline::{ScriptPipeline, ScriptRequest};
use exemplar_backend::retrieval::{QualityVerdict, Retriever, RetrieverConfig};
use exemplar_backend::store::{
    EmbeddedExample, Example, ExampleMetadata, ExampleStore, MemoryExampleStore,
};

const REFERENCE_SQL: &str =
    "CREATE TABLE DEALER_PAYOUT AS SELECT msisdn, amount FROM recharges WHERE month = 'Jun_25' GROUP BY msisdn;";

/// Maps every query to a vector at cosine 0.95 from `[1, 0]`.
struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_id(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(inputs.iter().map(|_| vec![0.95, 0.31225]).collect())
    }
}

struct CannedGenerator {
    reply: String,
    calls: AtomicUsize,
}

impl CannedGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerationService for CannedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        assert!(prompt.contains("CONTEXT:"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Replies with `script` until `failing_from` calls have been made, then errors.
struct FlakyGenerator {
    script: String,
    failing_from: usize,
    calls: Mutex<usize>,
}

#[async_trait]
impl GenerationService for FlakyGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String, RagError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls >= self.failing_from {
            Err(RagError::GenerationService("HTTP 500 from model server".to_string()))
        } else {
            Ok(self.script.clone())
        }
    }
}

/// Scores 1.0 for identical normalized structure, 0.3 otherwise.
struct StructuralComparator;

#[async_trait]
impl ComparatorService for StructuralComparator {
    async fn compare(&self, reference: &str, candidate: &str) -> Result<ValidationVerdict, RagError> {
        if reference == candidate {
            Ok(ValidationVerdict::new(1.0, Vec::new()))
        } else {
            Ok(ValidationVerdict::new(
                0.3,
                vec!["GROUP BY step is missing".to_string()],
            ))
        }
    }
}

async fn seeded_store() -> Arc<MemoryExampleStore> {
    let store = Arc::new(MemoryExampleStore::new());
    store
        .insert_batch(vec![EmbeddedExample {
            example: Example {
                id: Example::content_id("Dealer payout for June", REFERENCE_SQL),
                requirement_text: "Dealer payout for June".to_string(),
                solution_text: REFERENCE_SQL.to_string(),
                metadata: ExampleMetadata::default(),
            },
            embedding: vec![1.0, 0.0],
        }])
        .await
        .unwrap();
    store
}

fn pipeline(
    store: Arc<dyn ExampleStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn GenerationService>,
) -> ScriptPipeline {
    let retriever = Retriever::new(store, embedder, RetrieverConfig::default());
    let generation_loop = GenerationLoop::new(
        generator,
        Arc::new(StructuralComparator),
        LoopPolicy {
            attempt_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        },
    );
    ScriptPipeline::new(Arc::new(retriever), Arc::new(generation_loop))
}

fn request(text: &str) -> ScriptRequest {
    ScriptRequest {
        publish_cycle: Some("Jul_25".to_string()),
        ..ScriptRequest::new(text)
    }
}

#[tokio::test]
async fn empty_store_fails_fast_without_reference() {
    let generator = CannedGenerator::new("SELECT 1 FROM dual;");
    let pipeline = pipeline(
        Arc::new(MemoryExampleStore::new()),
        Arc::new(FixedEmbedder),
        generator.clone(),
    );

    let context = pipeline.retrieve(&request("Retailer bonus")).await.unwrap();
    assert!(context.all_results().is_empty());
    assert_eq!(context.analyze_quality().verdict, QualityVerdict::Poor);

    let response = pipeline
        .generate(request("Retailer bonus"), &CancelToken::new())
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("no_reference_example"));
    assert_eq!(response.attempts_used, 0);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn structurally_matching_script_is_accepted_first_time() {
    let generated = "```sql\nCREATE TABLE RETAIL_BONUS AS SELECT agent_id, bonus FROM sales WHERE month = 'PUBLISH_CYCLE' GROUP BY agent_id;\n```";
    let generator = CannedGenerator::new(generated);
    let pipeline = pipeline(seeded_store().await, Arc::new(FixedEmbedder), generator.clone());

    let response = pipeline
        .generate(request("Retailer bonus for July"), &CancelToken::new())
        .await
        .unwrap();

    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.attempts_used, 1);
    assert_eq!(response.comparator_score, Some(1.0));
    assert!(response
        .generated_text
        .as_deref()
        .unwrap_or_default()
        .starts_with("CREATE TABLE RETAIL_BONUS"));
    assert!(response.retrieval.reference_similarity.unwrap_or_default() > 0.9);
    assert!(response.lint.map(|lint| lint.is_valid).unwrap_or(false));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn structurally_different_script_exhausts_retries() {
    let generator = CannedGenerator::new("SELECT agent_id FROM sales;");
    let pipeline = pipeline(seeded_store().await, Arc::new(FixedEmbedder), generator.clone());

    let response = pipeline
        .generate(request("Retailer bonus for July"), &CancelToken::new())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("retries_exhausted"));
    assert_eq!(response.attempts_used, MAX_RETRIES);
    let last = response.last_attempt.expect("last attempt is reported");
    assert_eq!(last.attempt_index, MAX_RETRIES);
    assert!((last.comparator_score - 0.3).abs() < 1e-6);
    assert!(!last.differences.is_empty());
    assert!(last.prompt.contains("GROUP BY step is missing"));
    assert!(response.lint.is_some());
    assert_eq!(generator.calls.load(Ordering::SeqCst), MAX_RETRIES as usize);
}

#[tokio::test]
async fn blank_requirement_is_rejected() {
    let pipeline = pipeline(
        Arc::new(MemoryExampleStore::new()),
        Arc::new(FixedEmbedder),
        CannedGenerator::new("SELECT 1 FROM dual;"),
    );
    let err = pipeline
        .generate(request("   "), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
}

#[tokio::test]
async fn ingested_examples_are_retrievable_with_hashing_embedder() {
    let store = Arc::new(MemoryExampleStore::new());
    let embedder = Arc::new(HashingEmbedder::new(384));
    let ingestor = Ingestor::new(store.clone(), embedder.clone(), 32);

    let report = ingestor
        .upsert_batch(
            vec![
                ExampleInput {
                    requirement_text: "Dealer payout on prepaid recharge".to_string(),
                    solution_text: REFERENCE_SQL.to_string(),
                    ..ExampleInput::default()
                },
                ExampleInput {
                    requirement_text: "Quarterly churn report for postpaid".to_string(),
                    solution_text: "SELECT msisdn FROM churn;".to_string(),
                    ..ExampleInput::default()
                },
            ],
            false,
        )
        .await
        .unwrap();
    assert_eq!(report.inserted, 2);

    let pipeline = pipeline(store, embedder, CannedGenerator::new(REFERENCE_SQL));
    let context = pipeline
        .retrieve(&request("Dealer payout on prepaid recharge"))
        .await
        .unwrap();

    let top = &context.all_results()[0];
    assert_eq!(top.example.requirement_text, "Dealer payout on prepaid recharge");
    assert!(top.similarity > 0.99);
    assert!(context.reference().is_some());
}

#[tokio::test]
async fn exhausted_response_keeps_script_from_earlier_attempt() {
    let generator = Arc::new(FlakyGenerator {
        script: "SELECT a FROM t;".to_string(),
        failing_from: MAX_RETRIES as usize,
        calls: Mutex::new(0),
    });
    let pipeline = pipeline(seeded_store().await, Arc::new(FixedEmbedder), generator);

    let response = pipeline
        .generate(request("Retailer bonus for July"), &CancelToken::new())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("retries_exhausted"));
    assert_eq!(response.attempts_used, MAX_RETRIES);

    let last = response.last_attempt.as_ref().unwrap();
    assert!(last.generated_text.is_empty());
    assert!(last.error.is_some());

    let best = response.best_effort.as_ref().expect("earlier script is kept");
    assert_eq!(best.attempt_index, MAX_RETRIES - 1);
    assert_eq!(best.generated_text, "SELECT a FROM t;");
    assert_eq!(response.differences, vec!["GROUP BY step is missing"]);
    assert!((response.comparator_score.unwrap_or_default() - 0.3).abs() < 1e-6);
    assert!(response.lint.as_ref().map(|lint| lint.is_valid).unwrap_or(false));

    let body = serde_json::to_string(&response).unwrap();
    assert!(body.contains("SELECT a FROM t;"));
}
