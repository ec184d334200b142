//! Service facade
//!
//! The external surface of the engine: upload, chat, category and
//! document listing, document deletion, and session reset. Everything
//! else in the crate is wiring behind this type.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::{EmbeddingClient, HttpEmbeddingClient};
use crate::errors::{EngineError, Result};
use crate::index::{InMemoryIndex, QdrantIndex, VectorIndex};
use crate::ingest::{IngestPipeline, UploadReceipt, UploadRequest};
use crate::llm::{ChatModel, OllamaChatClient};
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::retrieval::{RetrievalConfig, Retriever};
use crate::router::CategoryRouter;
use crate::store::{ConversationStore, DocumentStore};
use crate::tools::ToolRegistry;
use crate::types::{CategorySlug, Document};

/// One chat turn request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub owner_id: String,
    /// Session to continue; a new one is created when absent
    pub session_id: Option<String>,
    pub message: String,
    /// Clear the session's message log before processing
    pub reset: bool,
}

/// A cited passage in a chat response
#[derive(Debug, Clone)]
pub struct Citation {
    pub chunk_id: String,
    pub document_id: String,
    pub snippet: String,
}

/// One chat turn response
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub routed_category: Option<CategorySlug>,
    pub tools_invoked: Vec<String>,
}

/// Knowledge service facade
pub struct DeskService {
    ingest: IngestPipeline,
    orchestrator: Orchestrator,
    documents: Arc<DocumentStore>,
    conversations: Arc<ConversationStore>,
    index: Arc<dyn VectorIndex>,
}

impl DeskService {
    pub fn builder() -> DeskServiceBuilder {
        DeskServiceBuilder::default()
    }

    /// Build a service from configuration: HTTP providers, and qdrant when
    /// configured (embedded in-memory index otherwise).
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(HttpEmbeddingClient::with_config(
            &config.providers.embedding_url,
            &config.providers.embedding_model,
            config.providers.embedding_dimension,
        )?);
        let model: Arc<dyn ChatModel> = Arc::new(OllamaChatClient::with_config(
            &config.providers.chat_url,
            &config.providers.chat_model,
        )?);
        let index: Arc<dyn VectorIndex> = match &config.providers.qdrant_url {
            Some(url) => Arc::new(QdrantIndex::connect(
                url,
                config.providers.embedding_dimension,
            )?),
            None => Arc::new(InMemoryIndex::new()),
        };

        let data_dir = Config::data_dir().map_err(|e| EngineError::Config(e.to_string()))?;
        let documents = Arc::new(DocumentStore::with_storage(data_dir.join("documents"))?);
        let conversations = Arc::new(ConversationStore::with_storage(data_dir.join("sessions"))?);

        Self::builder()
            .embedder(embedder)
            .model(model)
            .index(index)
            .documents(documents)
            .conversations(conversations)
            .retrieval(config.retrieval.to_retrieval_config())
            .orchestrator_config(OrchestratorConfig {
                max_iterations: config.orchestrator.max_iterations,
                turn_timeout: Duration::from_secs(config.orchestrator.turn_timeout_secs),
                top_k: config.retrieval.top_k,
            })
            .ingest_config(config.ingest.to_ingest_config())
            .build()
    }

    /// Upload a document into a category (created if unknown)
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt> {
        self.ingest.ingest(request).await
    }

    /// Replace a document's content under its existing id
    pub async fn reupload(
        &self,
        document_id: &str,
        request: UploadRequest,
    ) -> Result<UploadReceipt> {
        self.ingest.ingest_as(document_id, request).await
    }

    /// One chat turn. Honors the reset flag before processing the message.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.conversations
            .get_or_create_session(&session_id, &request.owner_id)
            .await;

        if request.reset {
            self.conversations.reset(&session_id).await?;
        }

        let known = self.documents.known_categories(&request.owner_id).await;
        let report = self
            .orchestrator
            .run_turn(&request.owner_id, &session_id, &request.message, &known)
            .await?;

        Ok(ChatResponse {
            session_id,
            answer: report.answer,
            citations: report
                .cited_chunks
                .into_iter()
                .map(|c| Citation {
                    chunk_id: c.chunk_id,
                    document_id: c.document_id,
                    snippet: c.text,
                })
                .collect(),
            routed_category: report.routed_category,
            tools_invoked: report.tools_invoked,
        })
    }

    /// Known categories for an owner
    pub async fn categories(&self, owner_id: &str) -> Vec<CategorySlug> {
        self.documents
            .known_categories(owner_id)
            .await
            .into_iter()
            .collect()
    }

    /// Register an empty category
    pub async fn create_category(&self, owner_id: &str, name: &str) -> Result<CategorySlug> {
        let slug = CategorySlug::parse(name)
            .ok_or_else(|| EngineError::Validation(format!("unusable category name: {:?}", name)))?;
        self.documents.create_category(owner_id, slug.clone()).await;
        Ok(slug)
    }

    /// Documents owned by an owner, newest first
    pub async fn documents(&self, owner_id: &str) -> Vec<Document> {
        self.documents.list_by_owner(owner_id).await
    }

    /// Cascade-delete a document the owner holds
    pub async fn delete_document(&self, owner_id: &str, document_id: &str) -> Result<()> {
        let document = self
            .documents
            .get(document_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("document {}", document_id)))?;

        if document.owner_id != owner_id {
            return Err(EngineError::Validation(format!(
                "document {} does not belong to {}",
                document_id, owner_id
            )));
        }

        self.documents
            .delete_cascade(document_id, self.index.as_ref())
            .await?;
        Ok(())
    }

    /// Clear a session's message log; documents and profile are untouched.
    /// Returns the number of messages removed.
    pub async fn reset_session(&self, session_id: &str) -> Result<usize> {
        self.conversations.reset(session_id).await
    }

    /// Maintenance: report orphaned vectors for a category
    pub async fn check_consistency(&self, category: &CategorySlug) -> Result<Vec<String>> {
        let live = self.documents.live_chunk_ids(category).await;
        crate::index::find_orphans(self.index.as_ref(), category, &live).await
    }

    pub fn document_store(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    pub fn conversation_store(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }
}

/// Builder wiring the service's collaborators; any omitted piece falls
/// back to the embedded default.
#[derive(Default)]
pub struct DeskServiceBuilder {
    embedder: Option<Arc<dyn EmbeddingClient>>,
    model: Option<Arc<dyn ChatModel>>,
    index: Option<Arc<dyn VectorIndex>>,
    registry: Option<ToolRegistry>,
    documents: Option<Arc<DocumentStore>>,
    conversations: Option<Arc<ConversationStore>>,
    retrieval: Option<RetrievalConfig>,
    orchestrator_config: Option<OrchestratorConfig>,
    ingest_config: Option<crate::ingest::IngestConfig>,
}

impl DeskServiceBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingClient>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn documents(mut self, documents: Arc<DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn conversations(mut self, conversations: Arc<ConversationStore>) -> Self {
        self.conversations = Some(conversations);
        self
    }

    pub fn retrieval(mut self, config: RetrievalConfig) -> Self {
        self.retrieval = Some(config);
        self
    }

    pub fn orchestrator_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator_config = Some(config);
        self
    }

    pub fn ingest_config(mut self, config: crate::ingest::IngestConfig) -> Self {
        self.ingest_config = Some(config);
        self
    }

    pub fn build(self) -> Result<DeskService> {
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => Arc::new(HttpEmbeddingClient::new()?),
        };
        let model: Arc<dyn ChatModel> = match self.model {
            Some(model) => model,
            None => Arc::new(OllamaChatClient::new()?),
        };
        let index = self
            .index
            .unwrap_or_else(|| Arc::new(InMemoryIndex::new()));
        let registry = self.registry.unwrap_or_default();
        let documents = self
            .documents
            .unwrap_or_else(|| Arc::new(DocumentStore::in_memory()));
        let conversations = self
            .conversations
            .unwrap_or_else(|| Arc::new(ConversationStore::in_memory()));
        let retrieval = self.retrieval.unwrap_or_default();
        let orchestrator_config = self.orchestrator_config.unwrap_or_default();

        let ingest = match self.ingest_config {
            Some(config) => IngestPipeline::with_config(
                embedder.clone(),
                index.clone(),
                documents.clone(),
                config,
            ),
            None => IngestPipeline::new(embedder.clone(), index.clone(), documents.clone()),
        };

        let retriever = Retriever::with_config(embedder, index.clone(), retrieval);
        let router = CategoryRouter::new(model.clone());
        let orchestrator = Orchestrator::new(
            router,
            retriever,
            model,
            registry,
            conversations.clone(),
            orchestrator_config,
        )?;

        Ok(DeskService {
            ingest,
            orchestrator,
            documents,
            conversations,
            index,
        })
    }
}
