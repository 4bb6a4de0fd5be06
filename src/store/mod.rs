pub mod example_store;
pub mod memory;
pub mod similarity;
pub mod sqlite;
pub mod types;

pub use example_store::{ExampleStore, Replacement};
pub use memory::MemoryExampleStore;
pub use sqlite::SqliteExampleStore;
pub use types::{EmbeddedExample, Example, ExampleMetadata, MetadataFilter, ScoredExample};
