//! Configuration types for Mosaic.
//!
//! `MosaicConfig` mirrors `<data_dir>/config.toml`. Every section and field
//! has a default, so an empty file (or no file) is a valid configuration.
//! Paths left unset are resolved against the data directory by the loader.

use serde::{Deserialize, Serialize};

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::retrieval::BoostFactors;
use crate::vector::DistanceMetric;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MosaicConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub keyword_index: KeywordIndexConfig,
}

impl MosaicConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indexing.chunk_size == 0 {
            return Err(ConfigError::Invalid("indexing.chunk_size must be > 0".into()));
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "indexing.chunk_overlap ({}) must be smaller than indexing.chunk_size ({})",
                self.indexing.chunk_overlap, self.indexing.chunk_size
            )));
        }
        if self.vector_store.batch_size == 0 {
            return Err(ConfigError::Invalid("vector_store.batch_size must be > 0".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid("embedding.dimension must be > 0".into()));
        }
        Ok(())
    }
}

/// Which inference backend produces embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackendKind {
    /// In-process ONNX CLIP models.
    #[default]
    Fastembed,
    /// Remote CLIP HTTP service.
    ClipService,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackendKind,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model cache. Defaults to `<data_dir>/models`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "clip-vit-b-32".to_string()
}

fn default_dimension() -> usize {
    512
}

fn default_service_url() -> String {
    "http://localhost:8004".to_string()
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::default(),
            model: default_model(),
            cache_dir: None,
            dimension: default_dimension(),
            service_url: default_service_url(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Which vector database holds the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackendKind {
    #[default]
    Qdrant,
    /// Embedded LanceDB under `lance_path`.
    Lance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackendKind,
    #[serde(default = "default_vector_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    #[serde(default)]
    pub distance: DistanceMetric,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Defaults to `<data_dir>/vectors`.
    #[serde(default)]
    pub lance_path: Option<PathBuf>,
    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

fn default_vector_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection_prefix() -> String {
    "mosaic".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_vector_timeout() -> u64 {
    30
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackendKind::default(),
            url: default_vector_url(),
            api_key: None,
            collection_prefix: default_collection_prefix(),
            distance: DistanceMetric::default(),
            batch_size: default_batch_size(),
            lance_path: None,
            timeout_secs: default_vector_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub extract_images: bool,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_true() -> bool {
    true
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            extract_images: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default)]
    pub default_threshold: f32,
    #[serde(default = "default_boost")]
    pub text_boost: f32,
    #[serde(default = "default_boost")]
    pub image_boost: f32,
}

fn default_limit() -> usize {
    10
}

fn default_boost() -> f32 {
    1.2
}

impl RetrievalConfig {
    pub fn boosts(&self) -> BoostFactors {
        BoostFactors {
            text: self.text_boost,
            image: self.image_boost,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_threshold: 0.0,
            text_boost: default_boost(),
            image_boost: default_boost(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordIndexConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to `<data_dir>/keyword.db`.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl Default for KeywordIndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database: None,
        }
    }
}
