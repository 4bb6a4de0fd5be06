pub mod context;
pub mod quality;
pub mod retriever;

pub use context::{RetrievalContext, RetrievalSummary};
pub use quality::{analyze_quality, QualityAnalysis, QualityVerdict};
pub use retriever::{Retriever, RetrieverConfig};
