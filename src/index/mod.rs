//! Vector index abstraction
//!
//! Per-category collections supporting idempotent upsert, similarity
//! search, and atomic delete-by-document. Similarity is cosine on
//! L2-normalized vectors; hits are ordered by descending score.
//!
//! Backends:
//! - [`memory::InMemoryIndex`] — embedded default, used by the test suite
//! - [`qdrant::QdrantIndex`] — production backend over a Qdrant server

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::Result;
use crate::types::CategorySlug;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

/// Metadata stored alongside each vector, carried back on search hits for
/// citation rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
}

/// One vector to upsert
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub metadata: PointMetadata,
}

/// One search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f32,
    /// Stored (normalized) vector, used downstream for near-duplicate
    /// suppression without re-embedding.
    pub vector: Vec<f32>,
    pub metadata: PointMetadata,
}

/// Per-category vector collection
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace points. Re-upserting a chunk id replaces its
    /// vector and metadata.
    async fn upsert(&self, category: &CategorySlug, points: Vec<IndexPoint>) -> Result<()>;

    /// Ranked similarity search, descending cosine score.
    async fn search(
        &self,
        category: &CategorySlug,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Remove every chunk belonging to a document. Atomic with respect to
    /// concurrent searches: an in-flight search sees the full old set or
    /// the full new set. Returns the number of removed points.
    async fn delete_by_document(&self, category: &CategorySlug, document_id: &str)
        -> Result<usize>;

    /// All chunk ids currently held for a category (maintenance use).
    async fn chunk_ids(&self, category: &CategorySlug) -> Result<Vec<String>>;
}

/// Maintenance check: find vectors with no corresponding live chunk.
///
/// Orphans are reported, not silently repaired; the caller decides whether
/// to delete them. A request that does not depend on an orphaned record is
/// never failed by this.
pub async fn find_orphans(
    index: &dyn VectorIndex,
    category: &CategorySlug,
    live_chunk_ids: &HashSet<String>,
) -> Result<Vec<String>> {
    let indexed = index.chunk_ids(category).await?;
    let orphans: Vec<String> = indexed
        .into_iter()
        .filter(|id| !live_chunk_ids.contains(id))
        .collect();

    if !orphans.is_empty() {
        tracing::warn!(
            category = %category,
            count = orphans.len(),
            "orphaned vectors detected"
        );
    }

    Ok(orphans)
}
