use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::chunker::ChunkerConfig;
use crate::ingest::IngestConfig;
use crate::retrieval::RetrievalConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub chunking: ChunkingSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub ingest: IngestSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Chat endpoint base URL
    pub chat_url: String,
    /// Chat model name
    pub chat_model: String,
    /// Embedding endpoint base URL
    pub embedding_url: String,
    /// Embedding model name
    pub embedding_model: String,
    /// Embedding vector dimension
    pub embedding_dimension: usize,
    /// Qdrant URL; unset means the embedded in-memory index
    pub qdrant_url: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            chat_url: crate::llm::DEFAULT_CHAT_URL.to_string(),
            chat_model: crate::llm::DEFAULT_CHAT_MODEL.to_string(),
            embedding_url: crate::embedding::DEFAULT_EMBEDDING_URL.to_string(),
            embedding_model: crate::embedding::DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: 768,
            qdrant_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        let defaults = ChunkerConfig::default();
        Self {
            target_tokens: defaults.target_tokens,
            overlap_tokens: defaults.overlap_tokens,
        }
    }
}

impl ChunkingSection {
    pub fn to_chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            target_tokens: self.target_tokens,
            overlap_tokens: self.overlap_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
    pub duplicate_threshold: f32,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        let defaults = RetrievalConfig::default();
        Self {
            top_k: defaults.top_k,
            duplicate_threshold: defaults.duplicate_threshold,
        }
    }
}

impl RetrievalSection {
    pub fn to_retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            top_k: self.top_k,
            duplicate_threshold: self.duplicate_threshold,
            ..RetrievalConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub max_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for IngestSection {
    fn default() -> Self {
        let defaults = IngestConfig::default();
        Self {
            max_bytes: defaults.max_bytes,
            allowed_extensions: defaults.allowed_extensions,
        }
    }
}

impl IngestSection {
    pub fn to_ingest_config(&self) -> IngestConfig {
        IngestConfig {
            max_bytes: self.max_bytes,
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub max_iterations: usize,
    pub turn_timeout_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            turn_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&config_path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".answerdesk").join("config.toml"))
    }

    /// Default data directory for store persistence
    pub fn data_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".answerdesk").join("data"))
    }
}
