//! Document store
//!
//! Durable record of uploaded documents, their chunk ids, and category
//! membership. Records are immutable once created except for deletion.
//! Deletion cascades through the vector index first and removes the
//! record only after the index accepted the delete, so readers observe
//! either the full document or none of it — never a partial state.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::errors::{EngineError, Result};
use crate::index::VectorIndex;
use crate::types::{CategorySlug, Document};

/// Document store with optional JSON-file persistence
pub struct DocumentStore {
    documents: RwLock<HashMap<String, Document>>,

    /// Categories created explicitly, listed even while empty
    explicit_categories: RwLock<HashMap<String, BTreeSet<CategorySlug>>>,

    /// Per-document-id writer locks serializing concurrent re-uploads
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,

    storage_dir: Option<PathBuf>,
}

impl DocumentStore {
    /// In-memory store (tests, embedded use)
    pub fn in_memory() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            explicit_categories: RwLock::new(HashMap::new()),
            writers: Mutex::new(HashMap::new()),
            storage_dir: None,
        }
    }

    /// Store backed by a directory of JSON records, loading whatever is
    /// already there.
    pub fn with_storage(storage_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&storage_dir)?;

        let mut documents = HashMap::new();
        for entry in fs::read_dir(&storage_dir)? {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("doc_") && n.ends_with(".json"))
                .unwrap_or(false);
            if !is_record {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(EngineError::from)
                .and_then(|json| serde_json::from_str::<Document>(&json).map_err(EngineError::from))
            {
                Ok(document) => {
                    documents.insert(document.id.clone(), document);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document record");
                }
            }
        }

        Ok(Self {
            documents: RwLock::new(documents),
            explicit_categories: RwLock::new(HashMap::new()),
            writers: Mutex::new(HashMap::new()),
            storage_dir: Some(storage_dir),
        })
    }

    /// Writer lock for one document id. Ingestion holds this across the
    /// whole replace so concurrent re-uploads serialize instead of
    /// interleaving.
    pub async fn writer_lock(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().await;
        writers
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Insert or replace a document record
    pub async fn put(&self, document: Document) -> Result<()> {
        if let Some(dir) = &self.storage_dir {
            let path = dir.join(format!("doc_{}.json", document.id));
            let json = serde_json::to_string_pretty(&document)?;
            fs::write(path, json)?;
        }

        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
        Ok(())
    }

    pub async fn get(&self, document_id: &str) -> Option<Document> {
        self.documents.read().await.get(document_id).cloned()
    }

    /// Documents belonging to an owner, newest first
    pub async fn list_by_owner(&self, owner_id: &str) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        docs
    }

    /// Register a category so it is listed even while empty
    pub async fn create_category(&self, owner_id: &str, category: CategorySlug) {
        self.explicit_categories
            .write()
            .await
            .entry(owner_id.to_string())
            .or_default()
            .insert(category);
    }

    /// The known category set for an owner: categories of live documents
    /// plus explicitly created ones. Deleting a document's last content
    /// leaves its category listed.
    pub async fn known_categories(&self, owner_id: &str) -> BTreeSet<CategorySlug> {
        let mut categories: BTreeSet<CategorySlug> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.owner_id == owner_id)
            .map(|d| d.category.clone())
            .collect();

        if let Some(explicit) = self.explicit_categories.read().await.get(owner_id) {
            categories.extend(explicit.iter().cloned());
        }

        categories
    }

    /// Chunk ids of all live documents in a category (consistency checks)
    pub async fn live_chunk_ids(&self, category: &CategorySlug) -> HashSet<String> {
        self.documents
            .read()
            .await
            .values()
            .filter(|d| &d.category == category)
            .flat_map(|d| d.chunk_ids.iter().cloned())
            .collect()
    }

    /// Cascade-delete a document: vector-index entries first, then the
    /// record. If the index delete fails the record stays intact and the
    /// whole operation can be retried; the category remains listed even
    /// when this was its last document.
    pub async fn delete_cascade(
        &self,
        document_id: &str,
        index: &dyn VectorIndex,
    ) -> Result<Document> {
        let lock = self.writer_lock(document_id).await;
        let _guard = lock.lock().await;

        let document = self
            .get(document_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("document {}", document_id)))?;

        let removed = index
            .delete_by_document(&document.category, document_id)
            .await?;
        if removed != document.chunk_ids.len() {
            // The index held a different chunk set than the record claims.
            // The delete still completed, so flag it rather than fail.
            tracing::warn!(
                document = document_id,
                expected = document.chunk_ids.len(),
                removed,
                "chunk count mismatch during cascade delete"
            );
        }

        // Keep the category listed even when now empty.
        self.create_category(&document.owner_id, document.category.clone())
            .await;

        self.documents.write().await.remove(document_id);

        if let Some(dir) = &self.storage_dir {
            let path = dir.join(format!("doc_{}.json", document_id));
            if path.exists() {
                fs::remove_file(path)?;
            }
        }

        Ok(document)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}
