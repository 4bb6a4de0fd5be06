//! SQLite-backed example store.
//!
//! Example rows and their little-endian f32 embeddings live in one table;
//! search is an exact brute-force cosine scan in insertion order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::example_store::{ExampleStore, Replacement};
use super::similarity::rank_candidates;
use super::types::{EmbeddedExample, Example, ExampleMetadata, MetadataFilter, ScoredExample};
use crate::core::errors::RagError;

pub struct SqliteExampleStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteExampleStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        if let Some(parent) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                RagError::store(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    err
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::store)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS examples (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                example_id TEXT NOT NULL UNIQUE,
                requirement_text TEXT NOT NULL,
                solution_text TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_example(row: &SqliteRow) -> Result<Example, RagError> {
        let metadata_str: String = row.try_get("metadata").map_err(RagError::store)?;
        let metadata = serde_json::from_str::<ExampleMetadata>(&metadata_str).unwrap_or_else(|err| {
            tracing::warn!("Unreadable example metadata, using defaults: {}", err);
            ExampleMetadata::default()
        });

        Ok(Example {
            id: row.try_get("example_id").map_err(RagError::store)?,
            requirement_text: row.try_get("requirement_text").map_err(RagError::store)?,
            solution_text: row.try_get("solution_text").map_err(RagError::store)?,
            metadata,
        })
    }

    async fn insert_rows(
        tx: &mut Transaction<'_, Sqlite>,
        items: &[EmbeddedExample],
    ) -> Result<usize, RagError> {
        let mut inserted = 0usize;
        for item in items {
            let blob = Self::serialize_embedding(&item.embedding);
            let metadata_str =
                serde_json::to_string(&item.example.metadata).map_err(RagError::store)?;

            let result = sqlx::query(
                "INSERT OR IGNORE INTO examples (example_id, requirement_text, solution_text, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&item.example.id)
            .bind(&item.example.requirement_text)
            .bind(&item.example.solution_text)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut **tx)
            .await
            .map_err(RagError::store)?;

            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }
}

#[async_trait]
impl ExampleStore for SqliteExampleStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn insert_batch(&self, items: Vec<EmbeddedExample>) -> Result<usize, RagError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;
        let inserted = Self::insert_rows(&mut tx, &items).await?;
        tx.commit().await.map_err(RagError::store)?;
        Ok(inserted)
    }

    async fn begin_replace<'a>(&'a self) -> Result<Box<dyn Replacement + 'a>, RagError> {
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;
        sqlx::query("DELETE FROM examples")
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        Ok(Box::new(SqliteReplacement { tx }))
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredExample>, RagError> {
        let rows = sqlx::query(
            "SELECT example_id, requirement_text, solution_text, metadata, embedding
             FROM examples
             ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        let mut candidates: Vec<(Example, Vec<f32>)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let embedding_bytes: Vec<u8> = row.try_get("embedding").map_err(RagError::store)?;
            if embedding_bytes.is_empty() {
                continue;
            }
            candidates.push((
                Self::row_to_example(row)?,
                Self::deserialize_embedding(&embedding_bytes),
            ));
        }

        Ok(rank_candidates(
            query_embedding,
            candidates
                .iter()
                .map(|(example, embedding)| (example, embedding.as_slice())),
            k,
            filter,
        ))
    }

    async fn get(&self, example_id: &str) -> Result<Option<Example>, RagError> {
        let row = sqlx::query(
            "SELECT example_id, requirement_text, solution_text, metadata
             FROM examples
             WHERE example_id = ?1",
        )
        .bind(example_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::store)?;

        row.as_ref().map(Self::row_to_example).transpose()
    }

    async fn delete(&self, example_id: &str) -> Result<bool, RagError> {
        let result = sqlx::query("DELETE FROM examples WHERE example_id = ?1")
            .bind(example_id)
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM examples")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(count.max(0) as usize)
    }

    async fn clear(&self) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM examples")
            .execute(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(result.rows_affected() as usize)
    }
}

/// Holds the write transaction open across batches; rolled back on drop.
struct SqliteReplacement {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl Replacement for SqliteReplacement {
    async fn write(&mut self, items: Vec<EmbeddedExample>) -> Result<usize, RagError> {
        SqliteExampleStore::insert_rows(&mut self.tx, &items).await
    }

    async fn commit(self: Box<Self>) -> Result<(), RagError> {
        self.tx.commit().await.map_err(RagError::store)
    }
}
