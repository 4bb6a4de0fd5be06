//! In-process example store.
//!
//! Holds everything in a vector behind an async `RwLock`; replacement swaps
//! the whole vector under the write guard.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::example_store::{ExampleStore, Replacement};
use super::similarity::rank_candidates;
use super::types::{EmbeddedExample, Example, MetadataFilter, ScoredExample};
use crate::core::errors::RagError;

#[derive(Default)]
pub struct MemoryExampleStore {
    rows: RwLock<Vec<EmbeddedExample>>,
}

impl MemoryExampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn dedup(items: Vec<EmbeddedExample>, seen: &mut HashSet<String>) -> Vec<EmbeddedExample> {
        items
            .into_iter()
            .filter(|item| seen.insert(item.example.id.clone()))
            .collect()
    }
}

#[async_trait]
impl ExampleStore for MemoryExampleStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn insert_batch(&self, items: Vec<EmbeddedExample>) -> Result<usize, RagError> {
        let mut rows = self.rows.write().await;
        let mut seen: HashSet<String> = rows.iter().map(|row| row.example.id.clone()).collect();
        let fresh = Self::dedup(items, &mut seen);
        let inserted = fresh.len();
        rows.extend(fresh);
        Ok(inserted)
    }

    async fn begin_replace<'a>(&'a self) -> Result<Box<dyn Replacement + 'a>, RagError> {
        Ok(Box::new(MemoryReplacement {
            store: self,
            staged: Vec::new(),
            seen: HashSet::new(),
        }))
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredExample>, RagError> {
        let rows = self.rows.read().await;
        Ok(rank_candidates(
            query_embedding,
            rows.iter()
                .map(|row| (&row.example, row.embedding.as_slice())),
            k,
            filter,
        ))
    }

    async fn get(&self, example_id: &str) -> Result<Option<Example>, RagError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|row| row.example.id == example_id)
            .map(|row| row.example.clone()))
    }

    async fn delete(&self, example_id: &str) -> Result<bool, RagError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.example.id != example_id);
        Ok(rows.len() != before)
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.rows.read().await.len())
    }

    async fn clear(&self) -> Result<usize, RagError> {
        let mut rows = self.rows.write().await;
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }
}

struct MemoryReplacement<'a> {
    store: &'a MemoryExampleStore,
    staged: Vec<EmbeddedExample>,
    seen: HashSet<String>,
}

#[async_trait]
impl<'a> Replacement for MemoryReplacement<'a> {
    async fn write(&mut self, items: Vec<EmbeddedExample>) -> Result<usize, RagError> {
        let fresh = MemoryExampleStore::dedup(items, &mut self.seen);
        let inserted = fresh.len();
        self.staged.extend(fresh);
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), RagError> {
        let MemoryReplacement { store, staged, .. } = *self;
        *store.rows.write().await = staged;
        Ok(())
    }
}
