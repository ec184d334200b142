//! Embedding provider abstraction
//!
//! Turns text into fixed-length vectors. The engine only ever talks to the
//! [`EmbeddingClient`] trait; the shipped implementation speaks the
//! Ollama-style `/api/embed` HTTP endpoint. Provider outages surface as
//! retryable `TransientProvider` errors and a failed batch is retried as a
//! whole, never partially committed.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{EngineError, Result};

/// Default embedding endpoint
pub const DEFAULT_EMBEDDING_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Request timeout for embedding calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Text-to-vector provider
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text into a fixed-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch, preserving input order. All-or-nothing: a provider
    /// failure fails the whole batch.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimension produced by this provider
    fn dimension(&self) -> usize;
}

/// HTTP embedding client (Ollama-style `/api/embed`)
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    /// Create a client with custom endpoint, model, and dimension
    pub fn with_config(base_url: &str, model: &str, dimension: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(EngineError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
        })
    }

    /// Create a client with default settings (768-dim nomic-embed-text)
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_EMBEDDING_URL, DEFAULT_EMBEDDING_MODEL, 768)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let request = EmbedRequest {
            model: self.model.clone(),
            input: inputs.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::provider("embedding", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::provider(
                "embedding",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EngineError::provider("embedding", format!("bad response: {}", e)))?;

        if parsed.embeddings.len() != inputs.len() {
            return Err(EngineError::provider(
                "embedding",
                format!(
                    "expected {} vectors, got {}",
                    inputs.len(),
                    parsed.embeddings.len()
                ),
            ));
        }

        for vector in &parsed.embeddings {
            if vector.len() != self.dimension {
                return Err(EngineError::provider(
                    "embedding",
                    format!(
                        "expected dimension {}, got {}",
                        self.dimension,
                        vector.len()
                    ),
                ));
            }
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedding request body
#[derive(Debug, Clone, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

/// Embedding response body
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// L2-normalize a vector in place; zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity between two vectors of equal length.
///
/// Mismatched lengths score 0.0 rather than panicking; the index layer
/// treats that as "not similar".
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
