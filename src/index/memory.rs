//! In-memory vector index
//!
//! Embedded backend: per-category point maps behind a single RwLock, so a
//! delete swaps a document's chunks out in one writer critical section and
//! a concurrent search never observes a partial set.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::embedding::normalize;
use crate::errors::Result;
use crate::index::{IndexPoint, PointMetadata, SearchHit, VectorIndex};
use crate::types::CategorySlug;

struct StoredPoint {
    vector: Vec<f32>,
    metadata: PointMetadata,
}

/// In-memory per-category vector collections
#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<CategorySlug, HashMap<String, StoredPoint>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points held for a category
    pub async fn len(&self, category: &CategorySlug) -> usize {
        self.collections
            .read()
            .await
            .get(category)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, category: &CategorySlug) -> bool {
        self.len(category).await == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, category: &CategorySlug, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let collection = collections.entry(category.clone()).or_default();

        for point in points {
            let mut vector = point.vector;
            normalize(&mut vector);
            collection.insert(
                point.chunk_id,
                StoredPoint {
                    vector,
                    metadata: point.metadata,
                },
            );
        }

        Ok(())
    }

    async fn search(
        &self,
        category: &CategorySlug,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let collections = self.collections.read().await;
        let Some(collection) = collections.get(category) else {
            return Ok(Vec::new());
        };

        let mut normalized_query = query.to_vec();
        normalize(&mut normalized_query);

        // Stored vectors are normalized at upsert, so dot product = cosine.
        let mut hits: Vec<SearchHit> = collection
            .iter()
            .map(|(chunk_id, point)| {
                let score: f32 = point
                    .vector
                    .iter()
                    .zip(normalized_query.iter())
                    .map(|(a, b)| a * b)
                    .sum();
                SearchHit {
                    chunk_id: chunk_id.clone(),
                    score,
                    vector: point.vector.clone(),
                    metadata: point.metadata.clone(),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn delete_by_document(
        &self,
        category: &CategorySlug,
        document_id: &str,
    ) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(category) else {
            return Ok(0);
        };

        let before = collection.len();
        collection.retain(|_, point| point.metadata.document_id != document_id);

        Ok(before - collection.len())
    }

    async fn chunk_ids(&self, category: &CategorySlug) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(category)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn slug(s: &str) -> CategorySlug {
        CategorySlug::parse(s).unwrap()
    }

    fn point(chunk_id: &str, document_id: &str, vector: Vec<f32>) -> IndexPoint {
        IndexPoint {
            chunk_id: chunk_id.to_string(),
            vector,
            metadata: PointMetadata {
                document_id: document_id.to_string(),
                chunk_index: 0,
                text: format!("text of {}", chunk_id),
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_and_search_ranked() {
        let index = InMemoryIndex::new();
        let hr = slug("hr");

        index
            .upsert(
                &hr,
                vec![
                    point("d1:0", "d1", vec![1.0, 0.0, 0.0]),
                    point("d1:1", "d1", vec![0.0, 1.0, 0.0]),
                    point("d2:0", "d2", vec![0.9, 0.1, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = index.search(&hr, &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "d1:0");
        assert_eq!(hits[1].chunk_id, "d2:0");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_replace() {
        let index = InMemoryIndex::new();
        let hr = slug("hr");

        index
            .upsert(&hr, vec![point("d1:0", "d1", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&hr, vec![point("d1:0", "d1", vec![0.0, 1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(index.len(&hr).await, 1);

        let hits = index.search(&hr, &[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].chunk_id, "d1:0");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_delete_by_document_removes_all_chunks() {
        let index = InMemoryIndex::new();
        let hr = slug("hr");

        index
            .upsert(
                &hr,
                vec![
                    point("d1:0", "d1", vec![1.0, 0.0]),
                    point("d1:1", "d1", vec![0.5, 0.5]),
                    point("d2:0", "d2", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let removed = index.delete_by_document(&hr, "d1").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.len(&hr).await, 1);

        let hits = index.search(&hr, &[1.0, 0.0], 10).await.unwrap();
        assert!(hits.iter().all(|h| h.metadata.document_id != "d1"));
    }

    #[tokio::test]
    async fn test_search_unknown_category_empty() {
        let index = InMemoryIndex::new();
        let hits = index.search(&slug("nope"), &[1.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_orphan_detection() {
        let index = InMemoryIndex::new();
        let hr = slug("hr");

        index
            .upsert(
                &hr,
                vec![
                    point("d1:0", "d1", vec![1.0, 0.0]),
                    point("ghost:0", "ghost", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let live: HashSet<String> = ["d1:0".to_string()].into_iter().collect();
        let orphans = crate::index::find_orphans(&index, &hr, &live).await.unwrap();
        assert_eq!(orphans, vec!["ghost:0".to_string()]);
    }
}
