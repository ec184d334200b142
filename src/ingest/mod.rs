//! Document ingestion pipeline
//!
//! Upload path: validate → chunk → embed batch → index + record. The
//! embedding batch is retried as a whole on provider outage and nothing
//! is committed until it succeeds, so a failed upload leaves no partial
//! state behind. Re-uploads of the same document id serialize on a
//! per-document writer lock and fully replace the previous content.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::chunker::{Chunker, ChunkerConfig};
use crate::embedding::EmbeddingClient;
use crate::errors::{EngineError, Result};
use crate::index::{IndexPoint, PointMetadata, VectorIndex};
use crate::retry::RetryManager;
use crate::store::DocumentStore;
use crate::types::{CategorySlug, Chunk, Document};

/// Ingestion limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum upload size in bytes
    pub max_bytes: usize,
    /// Accepted filename extensions (lowercase, no dot)
    pub allowed_extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1_048_576, // 1 MiB
            allowed_extensions: vec!["txt".to_string(), "md".to_string(), "csv".to_string()],
        }
    }
}

/// One upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_id: String,
    /// Free-text category name; created if unknown
    pub category: String,
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Optional per-upload chunking override
    pub chunking: Option<ChunkerConfig>,
}

/// What an accepted upload produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub chunk_count: usize,
    pub category: CategorySlug,
    pub created_at: chrono::DateTime<Utc>,
}

/// Ingestion pipeline
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    documents: Arc<DocumentStore>,
    retry: RetryManager,
    config: IngestConfig,
}

impl IngestPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        documents: Arc<DocumentStore>,
    ) -> Self {
        Self::with_config(embedder, index, documents, IngestConfig::default())
    }

    pub fn with_config(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        documents: Arc<DocumentStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            documents,
            retry: RetryManager::new(),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest a new document under a fresh id
    pub async fn ingest(&self, request: UploadRequest) -> Result<UploadReceipt> {
        let document_id = Uuid::new_v4().to_string();
        self.ingest_as(&document_id, request).await
    }

    /// Ingest under a caller-chosen id, fully replacing any previous
    /// content for that id (last writer wins).
    pub async fn ingest_as(
        &self,
        document_id: &str,
        request: UploadRequest,
    ) -> Result<UploadReceipt> {
        let category = self.validate(&request)?;
        let text = String::from_utf8(request.bytes.clone())
            .map_err(|_| EngineError::Validation("file is not valid UTF-8 text".to_string()))?;

        let chunker = match &request.chunking {
            Some(config) => Chunker::new(config.clone())?,
            None => Chunker::with_defaults(),
        };

        // Serialize writers per document id: a concurrent re-upload waits
        // here instead of interleaving with this one.
        let lock = self.documents.writer_lock(document_id).await;
        let _guard = lock.lock().await;

        let spans = chunker.chunk(&text);

        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
        let vectors = self
            .retry
            .execute_with_retry(|| self.embedder.embed_batch(&texts))
            .await?;

        // Replace semantics: clear any previous generation of this id
        // before the new one goes in.
        if let Some(previous) = self.documents.get(document_id).await {
            self.index
                .delete_by_document(&previous.category, document_id)
                .await?;
        }

        let chunks: Vec<Chunk> = spans
            .iter()
            .map(|span| Chunk {
                id: Chunk::make_id(document_id, span.index),
                document_id: document_id.to_string(),
                category: category.clone(),
                index: span.index,
                start: span.start,
                end: span.end,
                text: span.text.clone(),
            })
            .collect();

        let points: Vec<IndexPoint> = chunks
            .iter()
            .zip(vectors.into_iter())
            .map(|(chunk, vector)| IndexPoint {
                chunk_id: chunk.id.clone(),
                vector,
                metadata: PointMetadata {
                    document_id: document_id.to_string(),
                    chunk_index: chunk.index,
                    text: chunk.text.clone(),
                },
            })
            .collect();

        self.index.upsert(&category, points).await?;

        let document = Document {
            id: document_id.to_string(),
            owner_id: request.owner_id.clone(),
            category: category.clone(),
            filename: request.filename.clone(),
            byte_size: request.bytes.len(),
            created_at: Utc::now(),
            chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
        };
        let chunk_count = document.chunk_ids.len();
        let created_at = document.created_at;
        self.documents.put(document).await?;

        tracing::info!(
            document = document_id,
            category = %category,
            chunks = chunk_count,
            "document ingested"
        );

        Ok(UploadReceipt {
            document_id: document_id.to_string(),
            chunk_count,
            category,
            created_at,
        })
    }

    /// Typed validation errors for unsupported uploads
    fn validate(&self, request: &UploadRequest) -> Result<CategorySlug> {
        let extension = request
            .filename
            .rsplit('.')
            .next()
            .filter(|ext| *ext != request.filename)
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !self.config.allowed_extensions.contains(&extension) {
            return Err(EngineError::Validation(format!(
                "unsupported file type: {:?} (accepted: {})",
                request.filename,
                self.config.allowed_extensions.join(", ")
            )));
        }

        if request.bytes.len() > self.config.max_bytes {
            return Err(EngineError::Validation(format!(
                "file too large: {} bytes (limit {})",
                request.bytes.len(),
                self.config.max_bytes
            )));
        }

        CategorySlug::parse(&request.category).ok_or_else(|| {
            EngineError::Validation(format!("unusable category name: {:?}", request.category))
        })
    }
}
