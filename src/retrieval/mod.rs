//! Retrieval engine
//!
//! embed query → vector search → near-duplicate suppression. The index is
//! over-fetched so that suppressed duplicates can be refilled from the
//! next-best unique candidates without dropping below `top_k`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::embedding::{cosine_similarity, EmbeddingClient};
use crate::errors::Result;
use crate::index::{SearchHit, VectorIndex};
use crate::retry::RetryManager;
use crate::types::CategorySlug;

/// Retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results to return per query
    pub top_k: usize,
    /// Pairwise cosine similarity above which two chunks count as
    /// near-duplicates; only the higher-ranked survives
    pub duplicate_threshold: f32,
    /// Over-fetch multiplier so suppression can refill to `top_k`
    pub overfetch_factor: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            duplicate_threshold: 0.95,
            overfetch_factor: 3,
        }
    }
}

/// Retrieved chunk with citation metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Retrieval engine over one embedding client and one vector index
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    retry: RetryManager,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, index: Arc<dyn VectorIndex>) -> Self {
        Self::with_config(embedder, index, RetrievalConfig::default())
    }

    pub fn with_config(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            retry: RetryManager::new(),
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve deduplicated ranked chunks for a category.
    ///
    /// Returns an empty list (not an error) when the category holds no
    /// indexed content. Both the embedding and the search are
    /// read-idempotent and retried with bounded backoff.
    pub async fn retrieve(
        &self,
        category: &CategorySlug,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .retry
            .execute_with_retry(|| self.embedder.embed(query))
            .await?;

        let fetch = top_k * self.config.overfetch_factor.max(1);
        let hits = self
            .retry
            .execute_with_retry(|| self.index.search(category, &query_vector, fetch))
            .await?;

        let deduped = suppress_near_duplicates(hits, self.config.duplicate_threshold, top_k);

        tracing::debug!(
            category = %category,
            kept = deduped.len(),
            "retrieval complete"
        );

        Ok(deduped
            .into_iter()
            .map(|hit| RetrievedChunk {
                chunk_id: hit.chunk_id,
                document_id: hit.metadata.document_id,
                chunk_index: hit.metadata.chunk_index,
                text: hit.metadata.text,
                score: hit.score,
            })
            .collect())
    }
}

/// Keep the higher-ranked of any near-duplicate pair, refilling from the
/// next-best unique candidates up to `top_k`.
///
/// Hits must arrive ranked by descending score. The surviving set never
/// contains two chunks whose pairwise similarity exceeds `threshold`.
fn suppress_near_duplicates(hits: Vec<SearchHit>, threshold: f32, top_k: usize) -> Vec<SearchHit> {
    let mut kept: Vec<SearchHit> = Vec::with_capacity(top_k);

    for hit in hits {
        if kept.len() == top_k {
            break;
        }
        let duplicate = kept
            .iter()
            .any(|k| cosine_similarity(&k.vector, &hit.vector) > threshold);
        if !duplicate {
            kept.push(hit);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexPoint, InMemoryIndex, PointMetadata};
    use async_trait::async_trait;

    /// Deterministic embedder: maps known phrases to fixed unit vectors
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                t if t.contains("leave") => vec![1.0, 0.0, 0.0, 0.0],
                t if t.contains("vpn") => vec![0.0, 1.0, 0.0, 0.0],
                _ => vec![0.0, 0.0, 0.0, 1.0],
            })
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn point(chunk_id: &str, document_id: &str, vector: Vec<f32>, text: &str) -> IndexPoint {
        IndexPoint {
            chunk_id: chunk_id.to_string(),
            vector,
            metadata: PointMetadata {
                document_id: document_id.to_string(),
                chunk_index: 0,
                text: text.to_string(),
            },
        }
    }

    fn slug(s: &str) -> CategorySlug {
        CategorySlug::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_empty_category_returns_empty() {
        let retriever = Retriever::new(Arc::new(StubEmbedder), Arc::new(InMemoryIndex::new()));
        let chunks = retriever.retrieve(&slug("hr"), "leave policy", 5).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_retrieves_ranked_chunks() {
        let index = Arc::new(InMemoryIndex::new());
        index
            .upsert(
                &slug("hr"),
                vec![
                    point("d1:0", "d1", vec![0.99, 0.1, 0.0, 0.0], "leave policy text"),
                    point("d1:1", "d1", vec![0.0, 0.0, 1.0, 0.0], "unrelated"),
                ],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(StubEmbedder), index);
        let chunks = retriever.retrieve(&slug("hr"), "annual leave", 2).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_id, "d1:0");
        assert!(chunks[0].score > chunks[1].score);
    }

    #[tokio::test]
    async fn test_near_duplicates_suppressed_and_refilled() {
        let index = Arc::new(InMemoryIndex::new());
        // Two nearly identical vectors and one distinct; top_k 2 should
        // keep the best of the pair plus the distinct candidate.
        index
            .upsert(
                &slug("hr"),
                vec![
                    point("d1:0", "d1", vec![1.0, 0.0, 0.0, 0.0], "leave policy a"),
                    point("d2:0", "d2", vec![0.999, 0.01, 0.0, 0.0], "leave policy copy"),
                    point("d3:0", "d3", vec![0.6, 0.8, 0.0, 0.0], "travel policy"),
                ],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(StubEmbedder), index);
        let chunks = retriever.retrieve(&slug("hr"), "annual leave", 2).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_id, "d1:0");
        assert_eq!(chunks[1].chunk_id, "d3:0");
    }

    #[tokio::test]
    async fn test_no_pair_exceeds_threshold() {
        let index = Arc::new(InMemoryIndex::new());
        index
            .upsert(
                &slug("hr"),
                vec![
                    point("a:0", "a", vec![1.0, 0.0, 0.0, 0.0], "one"),
                    point("b:0", "b", vec![0.999, 0.02, 0.0, 0.0], "two"),
                    point("c:0", "c", vec![0.998, 0.04, 0.0, 0.0], "three"),
                    point("d:0", "d", vec![0.0, 1.0, 0.0, 0.0], "four"),
                ],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(Arc::new(StubEmbedder), index.clone());
        let chunks = retriever.retrieve(&slug("hr"), "annual leave", 4).await.unwrap();

        // Re-fetch stored vectors through search to check pairwise bounds.
        let hits = index
            .search(&slug("hr"), &[1.0, 0.0, 0.0, 0.0], 10)
            .await
            .unwrap();
        for a in &chunks {
            for b in &chunks {
                if a.chunk_id == b.chunk_id {
                    continue;
                }
                let va = &hits.iter().find(|h| h.chunk_id == a.chunk_id).unwrap().vector;
                let vb = &hits.iter().find(|h| h.chunk_id == b.chunk_id).unwrap().vector;
                assert!(cosine_similarity(va, vb) <= 0.95);
            }
        }
    }

    #[test]
    fn test_suppression_preserves_rank_order() {
        let hit = |id: &str, score: f32, v: Vec<f32>| SearchHit {
            chunk_id: id.to_string(),
            score,
            vector: v,
            metadata: PointMetadata {
                document_id: id.to_string(),
                chunk_index: 0,
                text: String::new(),
            },
        };

        let hits = vec![
            hit("a", 0.9, vec![1.0, 0.0]),
            hit("b", 0.8, vec![1.0, 0.001]),
            hit("c", 0.7, vec![0.0, 1.0]),
        ];

        let kept = suppress_near_duplicates(hits, 0.95, 2);
        let ids: Vec<&str> = kept.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
