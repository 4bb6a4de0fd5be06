use async_trait::async_trait;

use super::types::{EmbeddedExample, Example, MetadataFilter, ScoredExample};
use crate::core::errors::RagError;

/// A staged swap of the whole collection.
///
/// Readers keep seeing the previous collection until `commit`; dropping the
/// replacement without committing discards everything written to it.
#[async_trait]
pub trait Replacement: Send {
    /// Stages `items`, returning how many were new to the staged collection.
    async fn write(&mut self, items: Vec<EmbeddedExample>) -> Result<usize, RagError>;

    async fn commit(self: Box<Self>) -> Result<(), RagError>;
}

/// Storage backend for example vectors.
///
/// Implementations must allow concurrent `search` calls. `replace_all` must be
/// atomic with respect to readers: a query sees either the previous or the new
/// collection, never a mix.
#[async_trait]
pub trait ExampleStore: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Inserts examples, ignoring ids that are already stored.
    /// Returns the number of rows actually written.
    async fn insert_batch(&self, items: Vec<EmbeddedExample>) -> Result<usize, RagError>;

    /// Starts replacing the whole collection. Batches are written through the
    /// returned [`Replacement`] and become visible together on commit.
    async fn begin_replace<'a>(&'a self) -> Result<Box<dyn Replacement + 'a>, RagError>;

    /// Drops the whole collection and stores `items` in its place.
    async fn replace_all(&self, items: Vec<EmbeddedExample>) -> Result<usize, RagError> {
        let mut replacement = self.begin_replace().await?;
        let inserted = replacement.write(items).await?;
        replacement.commit().await?;
        Ok(inserted)
    }

    /// Top-`k` examples by cosine similarity, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredExample>, RagError>;

    async fn get(&self, example_id: &str) -> Result<Option<Example>, RagError>;

    async fn delete(&self, example_id: &str) -> Result<bool, RagError>;

    async fn count(&self) -> Result<usize, RagError>;

    /// Removes every example and returns how many were removed.
    async fn clear(&self) -> Result<usize, RagError>;
}
