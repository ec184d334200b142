//! Document, chunk, and category types
//!
//! Documents are immutable once created except for deletion and are owned
//! by the document store; everything else refers to them by id. Chunk ids
//! are stable across re-indexing (`{document_id}:{index}`) and the chunk
//! set of a document is only ever deleted as a whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized category identifier.
///
/// Lowercase, with runs of non-alphanumeric characters collapsed to single
/// dashes. Two inputs that normalize equally name the same category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySlug(String);

impl CategorySlug {
    /// Normalize a free-text category name into a slug.
    ///
    /// Returns `None` when no alphanumeric content survives normalization.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut slug = String::with_capacity(raw.len());
        let mut pending_dash = false;

        for ch in raw.chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(ch.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        if slug.is_empty() {
            None
        } else {
            Some(CategorySlug(slug))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CategorySlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uploaded document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Opaque unique id
    pub id: String,

    /// Owner (user) id
    pub owner_id: String,

    /// Category this document belongs to
    pub category: CategorySlug,

    /// Original filename as uploaded
    pub filename: String,

    /// Size of the original upload in bytes
    pub byte_size: usize,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Ordered ids of the chunks produced at ingestion
    pub chunk_ids: Vec<String>,
}

/// A bounded span of a document's text, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id: `{document_id}:{index}`
    pub id: String,

    /// Owning document id
    pub document_id: String,

    /// Category inherited from the document
    pub category: CategorySlug,

    /// 0-based position within the document
    pub index: usize,

    /// Character span [start, end) into the source text
    pub start: usize,
    pub end: usize,

    /// Text payload
    pub text: String,
}

impl Chunk {
    /// Compose the stable chunk id for a document and index
    pub fn make_id(document_id: &str, index: usize) -> String {
        format!("{}:{}", document_id, index)
    }
}

/// Long-lived per-owner profile, unaffected by session resets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub owner_id: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OwnerProfile {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            display_name: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_normalization() {
        assert_eq!(CategorySlug::parse("HR").unwrap().as_str(), "hr");
        assert_eq!(
            CategorySlug::parse("  Human Resources ").unwrap().as_str(),
            "human-resources"
        );
        assert_eq!(CategorySlug::parse("IT/Ops").unwrap().as_str(), "it-ops");
    }

    #[test]
    fn test_slug_equivalent_inputs() {
        assert_eq!(
            CategorySlug::parse("HR Policies"),
            CategorySlug::parse("hr---policies")
        );
    }

    #[test]
    fn test_slug_rejects_empty() {
        assert!(CategorySlug::parse("").is_none());
        assert!(CategorySlug::parse("---").is_none());
        assert!(CategorySlug::parse("   ").is_none());
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(Chunk::make_id("doc-1", 3), "doc-1:3");
    }
}
