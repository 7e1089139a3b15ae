//! File-backed vector store with cosine similarity search.
//!
//! A store is one JSON collection under the database directory, rebuilt
//! from scratch whenever ingestion reruns. The build embeds everything
//! before anything is written, and the file lands via temp-file + rename,
//! so a reader never observes a partially populated collection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::Embedder;
use crate::splitter::DocumentChunk;

pub const COLLECTION_NAME: &str = "db_collection";
pub const DEFAULT_TOP_K: usize = 3;

/// A persisted (chunk, vector) entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub relative_path: String,
    pub chunk_index: usize,
    pub text: String,
    embedding: Vec<f32>,
}

/// A search result with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub relative_path: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

pub struct VectorStore {
    entries: Vec<StoredChunk>,
    persist_path: PathBuf,
}

/// Pair chunks with their embeddings; the two sequences must be parallel.
fn assemble(chunks: &[DocumentChunk], embeddings: Vec<Vec<f32>>) -> Result<Vec<StoredChunk>> {
    if chunks.len() != embeddings.len() {
        anyhow::bail!(
            "Embedding count mismatch: {} chunks, {} vectors",
            chunks.len(),
            embeddings.len()
        );
    }
    Ok(chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| StoredChunk {
            id: chunk.id.clone(),
            relative_path: chunk.relative_path.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            embedding,
        })
        .collect())
}

impl VectorStore {
    /// Embed every chunk and persist the collection, replacing any previous
    /// collection of the same name. Any failure leaves the old file (or no
    /// file) in place; callers must treat an error as "store absent".
    pub async fn build(
        chunks: &[DocumentChunk],
        embedder: &Embedder,
        client: &reqwest::Client,
        database_dir: &Path,
        collection_name: &str,
    ) -> Result<Self> {
        tracing::info!(
            "Embedding {} chunks with {} ({})",
            chunks.len(),
            embedder.provider,
            embedder.model
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(client, &texts).await?;
        let entries = assemble(chunks, embeddings)?;

        let store = Self {
            entries,
            persist_path: Self::collection_path(database_dir, collection_name),
        };
        store.persist()?;
        tracing::info!(
            "Vector store ready: {} entries at {}",
            store.entries.len(),
            store.persist_path.display()
        );
        Ok(store)
    }

    /// Load a previously persisted collection.
    pub fn open(database_dir: &Path, collection_name: &str) -> Result<Self> {
        let persist_path = Self::collection_path(database_dir, collection_name);
        let data = std::fs::read_to_string(&persist_path)
            .with_context(|| format!("Failed to read vector store {}", persist_path.display()))?;
        let entries: Vec<StoredChunk> =
            serde_json::from_str(&data).context("Failed to parse vector store")?;
        Ok(Self {
            entries,
            persist_path,
        })
    }

    /// Whether a persisted collection is present on disk.
    pub fn exists(database_dir: &Path, collection_name: &str) -> bool {
        Self::collection_path(database_dir, collection_name).is_file()
    }

    fn collection_path(database_dir: &Path, collection_name: &str) -> PathBuf {
        database_dir.join(format!("{collection_name}.json"))
    }

    /// Write the collection atomically (temp file + rename).
    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(&self.entries)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .with_context(|| format!("Failed to move store into {}", self.persist_path.display()))?;
        Ok(())
    }

    /// Top-k nearest chunks by cosine similarity, descending. The sort is
    /// stable, so equal scores keep insertion order.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(f32, &StoredChunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, e)| ScoredChunk {
                id: e.id.clone(),
                relative_path: e.relative_path.clone(),
                chunk_index: e.chunk_index,
                text: e.text.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<StoredChunk>, persist_path: PathBuf) -> Self {
        Self {
            entries,
            persist_path,
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
