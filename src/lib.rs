pub mod core;
pub mod embedding;
pub mod generation;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod state;
pub mod store;
pub mod text;
