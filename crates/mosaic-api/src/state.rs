//! Application state wiring all services together.
//!
//! AppState pins the generic indexer and retrieval service to the backends
//! chosen in config. Construction never touches the network: backends are
//! probed lazily by `ensure_ready`, so `status` can report a dead backend
//! instead of failing at startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mosaic_core::embedding::box_backend::BoxEmbeddingBackend;
use mosaic_core::embedding::provider::EmbeddingProvider;
use mosaic_core::indexing::indexer::{Indexer, IndexerSettings};
use mosaic_core::indexing::keyword::NoopKeywordIndex;
use mosaic_core::retrieval::service::RetrievalService;
use mosaic_core::vector::box_backend::BoxVectorBackend;
use mosaic_core::vector::store::{StoreSettings, VectorStore};
use mosaic_infra::chunker::SplitterChunker;
use mosaic_infra::config::{load_config, resolve_data_dir};
use mosaic_infra::embedding::clip_service::ClipServiceBackend;
use mosaic_infra::embedding::fastembed::FastEmbedClipBackend;
use mosaic_infra::keyword::ConfiguredKeywordIndex;
use mosaic_infra::keyword::sqlite::SqliteKeywordIndex;
use mosaic_infra::parser::LocalFileParser;
use mosaic_infra::sqlite::pool::DatabasePool;
use mosaic_infra::vector::lance::LanceBackend;
use mosaic_infra::vector::qdrant::QdrantBackend;
use mosaic_observe::attrs::SPAN_INIT;
use mosaic_types::config::{
    EmbeddingBackendKind, EmbeddingConfig, KeywordIndexConfig, MosaicConfig, VectorBackendKind,
    VectorStoreConfig,
};
use secrecy::SecretString;
use tracing::Instrument;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteIndexer = Indexer<
    LocalFileParser,
    SplitterChunker,
    BoxEmbeddingBackend,
    BoxVectorBackend,
    ConfiguredKeywordIndex,
>;

pub type ConcreteRetrievalService = RetrievalService<BoxEmbeddingBackend, BoxVectorBackend>;

/// Shared application state holding all services.
pub struct AppState {
    pub config: MosaicConfig,
    pub data_dir: PathBuf,
    pub embeddings: Arc<EmbeddingProvider<BoxEmbeddingBackend>>,
    pub vectors: Arc<VectorStore<BoxVectorBackend>>,
    pub indexer: ConcreteIndexer,
    pub retrieval: ConcreteRetrievalService,
}

impl AppState {
    /// Load config and wire services. Does not contact any backend.
    pub async fn init() -> anyhow::Result<Self> {
        async {
            let data_dir = resolve_data_dir();
            tokio::fs::create_dir_all(&data_dir)
                .await
                .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

            let config = load_config(&data_dir).await;
            config.validate()?;

            let embedding_backend = build_embedding_backend(&config.embedding, &data_dir)?;
            let embeddings = Arc::new(EmbeddingProvider::new(embedding_backend, config.embedding.dimension));

            let vector_backend = build_vector_backend(&config.vector_store, &data_dir).await?;
            let vectors = Arc::new(VectorStore::new(
                vector_backend,
                StoreSettings {
                    collection_prefix: config.vector_store.collection_prefix.clone(),
                    dimension: config.embedding.dimension,
                    distance: config.vector_store.distance,
                    batch_size: config.vector_store.batch_size,
                },
            ));

            let keywords = open_keyword_index(&config.keyword_index, &data_dir).await;

            let indexer = Indexer::new(
                LocalFileParser::new(),
                SplitterChunker::new(),
                Arc::clone(&embeddings),
                Arc::clone(&vectors),
                keywords,
                IndexerSettings {
                    chunk_size: config.indexing.chunk_size,
                    chunk_overlap: config.indexing.chunk_overlap,
                    extract_images: config.indexing.extract_images,
                },
            );

            let retrieval = RetrievalService::new(
                Arc::clone(&embeddings),
                Arc::clone(&vectors),
                config.retrieval.boosts(),
            );

            tracing::debug!(
                data_dir = %data_dir.display(),
                embedding = ?config.embedding.backend,
                vector_store = ?config.vector_store.backend,
                "services wired"
            );

            Ok::<_, anyhow::Error>(Self {
                config,
                data_dir,
                embeddings,
                vectors,
                indexer,
                retrieval,
            })
        }
        .instrument(tracing::info_span!(SPAN_INIT))
        .await
    }

    /// Load the embedding model and provision collections.
    pub async fn ensure_ready(&self) -> anyhow::Result<()> {
        self.indexer
            .initialize()
            .instrument(tracing::info_span!(SPAN_INIT, stage = "backends"))
            .await
            .context("backends are not available (run `mosaic status` for details)")?;
        self.retrieval.initialize()?;
        Ok(())
    }
}

fn build_embedding_backend(config: &EmbeddingConfig, data_dir: &std::path::Path) -> anyhow::Result<BoxEmbeddingBackend> {
    let backend = match config.backend {
        EmbeddingBackendKind::Fastembed => {
            let cache_dir = config.cache_dir.clone().unwrap_or_else(|| data_dir.join("models"));
            BoxEmbeddingBackend::new(FastEmbedClipBackend::new(cache_dir, &config.model)?)
        }
        EmbeddingBackendKind::ClipService => BoxEmbeddingBackend::new(ClipServiceBackend::new(
            config.service_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?),
    };
    Ok(backend)
}

async fn build_vector_backend(config: &VectorStoreConfig, data_dir: &std::path::Path) -> anyhow::Result<BoxVectorBackend> {
    let backend = match config.backend {
        VectorBackendKind::Qdrant => BoxVectorBackend::new(QdrantBackend::new(
            config.url.clone(),
            config.api_key.clone().map(SecretString::from),
            Duration::from_secs(config.timeout_secs),
        )?),
        VectorBackendKind::Lance => {
            let path = config.lance_path.clone().unwrap_or_else(|| data_dir.join("vectors"));
            BoxVectorBackend::new(LanceBackend::open(path, config.distance).await?)
        }
    };
    Ok(backend)
}

/// A keyword index that cannot be opened is disabled rather than fatal.
async fn open_keyword_index(config: &KeywordIndexConfig, data_dir: &std::path::Path) -> ConfiguredKeywordIndex {
    if !config.enabled {
        return ConfiguredKeywordIndex::Disabled(NoopKeywordIndex);
    }
    let path = config.database.clone().unwrap_or_else(|| data_dir.join("keyword.db"));
    match DatabasePool::open(&path).await {
        Ok(pool) => ConfiguredKeywordIndex::Sqlite(SqliteKeywordIndex::new(pool)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "keyword index unavailable, continuing without it");
            ConfiguredKeywordIndex::Disabled(NoopKeywordIndex)
        }
    }
}
