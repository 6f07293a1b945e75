use thiserror::Error;

/// Errors raised by the embedding provider and its inference backends.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider is not initialized")]
    NotReady,

    #[error("cannot embed empty input")]
    EmptyInput,

    #[error("failed to load embedding model: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected response from embedding backend: {0}")]
    UnexpectedResponse(String),
}

/// Errors raised by the vector store layer and its backends.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector backend unreachable: {0}")]
    Unreachable(String),

    #[error("vector store is not initialized")]
    NotInitialized,

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("collection '{0}' already exists")]
    AlreadyExists(String),

    #[error("upsert batch {batch}/{total_batches} failed after {persisted} records were persisted: {reason}")]
    BatchFailed {
        batch: usize,
        total_batches: usize,
        persisted: usize,
        reason: String,
    },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Errors from the document parser collaborator.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported document type: '{0}'")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Errors from text chunking.
#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidConfig { size: usize, overlap: usize },

    #[error("splitter error: {0}")]
    Splitter(String),
}

/// Errors from the keyword (full-text) index collaborator.
#[derive(Debug, Error)]
pub enum KeywordIndexError {
    #[error("keyword index connection error: {0}")]
    Connection(String),

    #[error("keyword index query error: {0}")]
    Query(String),
}

/// Errors from indexer setup and maintenance. The per-document pipeline
/// reports its failures inside `IndexingResult` instead.
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    #[error(transparent)]
    KeywordIndex(#[from] KeywordIndexError),
}

/// Errors surfaced by the retrieval service.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval service not ready: {0}")]
    NotReady(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

/// Errors from configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
