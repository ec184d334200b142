//! Qdrant-backed vector index
//!
//! Production backend: one Qdrant collection per category, created lazily
//! on first upsert. Point payloads carry the chunk metadata; deletion by
//! document uses a payload filter so the whole chunk set goes in one
//! request. Qdrant applies point operations atomically per request, which
//! satisfies the full-old-or-full-new visibility rule for searches.

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        points_selector::PointsSelectorOneOf, vectors_config::Config, vectors_output,
        with_payload_selector::SelectorOptions, with_vectors_selector, Condition,
        CreateCollection, Distance, FieldCondition, Filter, Match, PointStruct, PointsSelector,
        ScrollPoints, SearchPoints, Value as QdrantValue, VectorParams, VectorsConfig,
        VectorsOutput, WithPayloadSelector, WithVectorsSelector,
    },
};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::errors::{EngineError, Result};
use crate::index::{IndexPoint, PointMetadata, SearchHit, VectorIndex};
use crate::types::CategorySlug;

/// Collection name prefix, keeping engine collections apart from anything
/// else living in the same Qdrant instance.
const COLLECTION_PREFIX: &str = "answerdesk_";

/// Qdrant vector index
pub struct QdrantIndex {
    client: QdrantClient,
    dimension: u64,
    ensured: Mutex<HashSet<String>>,
}

impl QdrantIndex {
    /// Connect to a Qdrant server
    pub fn connect(url: &str, dimension: usize) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| EngineError::provider("qdrant", e.to_string()))?;

        Ok(Self {
            client,
            dimension: dimension as u64,
            ensured: Mutex::new(HashSet::new()),
        })
    }

    fn collection_name(category: &CategorySlug) -> String {
        format!("{}{}", COLLECTION_PREFIX, category)
    }

    /// Create the category's collection if it does not exist yet
    async fn ensure_collection(&self, category: &CategorySlug) -> Result<String> {
        let name = Self::collection_name(category);

        let mut ensured = self.ensured.lock().await;
        if ensured.contains(&name) {
            return Ok(name);
        }

        let existing = self
            .client
            .list_collections()
            .await
            .map_err(|e| EngineError::provider("qdrant", e.to_string()))?;
        let exists = existing.collections.iter().any(|c| c.name == name);

        if !exists {
            self.client
                .create_collection(&CreateCollection {
                    collection_name: name.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: self.dimension,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| EngineError::provider("qdrant", e.to_string()))?;
        }

        ensured.insert(name.clone());
        Ok(name)
    }

    fn document_filter(document_id: &str) -> Filter {
        Filter {
            must: vec![Condition {
                condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
                    FieldCondition {
                        key: "document_id".to_string(),
                        r#match: Some(Match {
                            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                                document_id.to_string(),
                            )),
                        }),
                        ..Default::default()
                    },
                )),
            }],
            ..Default::default()
        }
    }

    fn payload_for(chunk_id: &str, metadata: &PointMetadata) -> HashMap<String, QdrantValue> {
        let mut payload = HashMap::new();
        payload.insert(
            "chunk_id".to_string(),
            QdrantValue::from(chunk_id.to_string()),
        );
        payload.insert(
            "document_id".to_string(),
            QdrantValue::from(metadata.document_id.clone()),
        );
        payload.insert(
            "chunk_index".to_string(),
            QdrantValue::from(metadata.chunk_index as i64),
        );
        payload.insert("text".to_string(), QdrantValue::from(metadata.text.clone()));
        payload
    }

    fn metadata_from(payload: &HashMap<String, QdrantValue>) -> Option<(String, PointMetadata)> {
        let chunk_id = string_value(payload.get("chunk_id")?)?;
        let document_id = string_value(payload.get("document_id")?)?;
        let chunk_index = integer_value(payload.get("chunk_index")?)? as usize;
        let text = string_value(payload.get("text")?).unwrap_or_default();

        Some((
            chunk_id,
            PointMetadata {
                document_id,
                chunk_index,
                text,
            },
        ))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, category: &CategorySlug, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let collection = self.ensure_collection(category).await?;

        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let payload = Self::payload_for(&p.chunk_id, &p.metadata);
                // Qdrant point ids must be uuid or integer, so the chunk id
                // lives in the payload and the point id is derived from it.
                let point_id = uuid::Uuid::new_v5(
                    &uuid::Uuid::NAMESPACE_OID,
                    p.chunk_id.as_bytes(),
                )
                .to_string();
                PointStruct::new(point_id, p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points_blocking(&collection, None, qdrant_points, None)
            .await
            .map_err(|e| EngineError::provider("qdrant", e.to_string()))?;

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

        let collection = Self::collection_name(category);

        let response = match self
            .client
            .search_points(&SearchPoints {
                collection_name: collection,
                vector: query.to_vec(),
                limit: top_k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                with_vectors: Some(WithVectorsSelector {
                    selector_options: Some(with_vectors_selector::SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
        {
            Ok(response) => response,
            // A category with no collection yet simply has no content.
            Err(e) if e.to_string().contains("doesn't exist") => return Ok(Vec::new()),
            Err(e) => return Err(EngineError::provider("qdrant", e.to_string())),
        };

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                let (chunk_id, metadata) = Self::metadata_from(&point.payload)?;
                let vector = vector_data(point.vectors);
                Some(SearchHit {
                    chunk_id,
                    score: point.score,
                    vector,
                    metadata,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn delete_by_document(
        &self,
        category: &CategorySlug,
        document_id: &str,
    ) -> Result<usize> {
        let collection = Self::collection_name(category);

        let existing = self.chunk_ids_for_document(category, document_id).await?;
        if existing == 0 {
            return Ok(0);
        }

        self.client
            .delete_points(
                &collection,
                None,
                &PointsSelector {
                    points_selector_one_of: Some(PointsSelectorOneOf::Filter(
                        Self::document_filter(document_id),
                    )),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::provider("qdrant", e.to_string()))?;

        Ok(existing)
    }

    async fn chunk_ids(&self, category: &CategorySlug) -> Result<Vec<String>> {
        let collection = Self::collection_name(category);
        let mut ids = Vec::new();
        let mut offset = None;

        loop {
            let response = match self
                .client
                .scroll(&ScrollPoints {
                    collection_name: collection.clone(),
                    limit: Some(256),
                    offset: offset.clone(),
                    with_payload: Some(WithPayloadSelector {
                        selector_options: Some(SelectorOptions::Enable(true)),
                    }),
                    ..Default::default()
                })
                .await
            {
                Ok(response) => response,
                Err(e) if e.to_string().contains("doesn't exist") => return Ok(Vec::new()),
                Err(e) => return Err(EngineError::provider("qdrant", e.to_string())),
            };

            for point in &response.result {
                if let Some((chunk_id, _)) = Self::metadata_from(&point.payload) {
                    ids.push(chunk_id);
                }
            }

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }
}

impl QdrantIndex {
    async fn chunk_ids_for_document(
        &self,
        category: &CategorySlug,
        document_id: &str,
    ) -> Result<usize> {
        let all = self.chunk_ids(category).await?;
        let prefix = format!("{}:", document_id);
        Ok(all.iter().filter(|id| id.starts_with(&prefix)).count())
    }
}

fn vector_data(vectors: Option<VectorsOutput>) -> Vec<f32> {
    match vectors.and_then(|v| v.vectors_options) {
        Some(vectors_output::VectorsOptions::Vector(v)) => v.data,
        _ => Vec::new(),
    }
}

fn string_value(value: &QdrantValue) -> Option<String> {
    use qdrant_client::qdrant::value::Kind;
    match value.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn integer_value(value: &QdrantValue) -> Option<i64> {
    use qdrant_client::qdrant::value::Kind;
    match value.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        _ => None,
    }
}
