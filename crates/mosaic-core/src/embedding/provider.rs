//! Embedding provider: one-shot initialization and input validation in front
//! of an [`EmbeddingBackend`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use mosaic_types::error::EmbeddingError;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::backend::EmbeddingBackend;
use super::format::sniff_image_format;

/// Turns text or image bytes into vectors of a fixed dimension.
///
/// `initialize()` loads the backend at most once. Concurrent callers wait on
/// the same attempt and observe the same outcome, including a failure.
pub struct EmbeddingProvider<B: EmbeddingBackend> {
    backend: B,
    dimension: usize,
    init: OnceCell<Result<(), String>>,
    ready: AtomicBool,
}

impl<B: EmbeddingBackend> EmbeddingProvider<B> {
    pub fn new(backend: B, dimension: usize) -> Self {
        Self {
            backend,
            dimension,
            init: OnceCell::new(),
            ready: AtomicBool::new(false),
        }
    }

    /// Load the backend. Idempotent.
    pub async fn initialize(&self) -> Result<(), EmbeddingError> {
        let outcome = self
            .init
            .get_or_init(|| async {
                let start = Instant::now();
                match self.backend.load().await {
                    Ok(()) => {
                        self.ready.store(true, Ordering::Release);
                        info!(
                            model = %self.backend.model_name(),
                            dimension = self.dimension,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "embedding provider initialized"
                        );
                        Ok(())
                    }
                    Err(e) => {
                        warn!(model = %self.backend.model_name(), error = %e, "embedding provider failed to initialize");
                        Err(match e {
                            EmbeddingError::Load(msg) => msg,
                            other => other.to_string(),
                        })
                    }
                }
            })
            .await;

        outcome.clone().map_err(EmbeddingError::Load)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Embed one text.
    ///
    /// # Errors
    /// `NotReady` before a successful `initialize()`, `EmptyInput` for blank
    /// text, or the backend's inference error.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.is_ready() {
            return Err(EmbeddingError::NotReady);
        }
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let vector = self.backend.embed_text(text).await?;
        self.check_dimension(&vector, "text");
        Ok(vector)
    }

    /// Embed one encoded image. The format is sniffed from the bytes.
    pub async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        if !self.is_ready() {
            return Err(EmbeddingError::NotReady);
        }
        if bytes.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let format = sniff_image_format(bytes);
        debug!(%format, size = bytes.len(), "embedding image");
        let vector = self.backend.embed_image(bytes, format).await?;
        self.check_dimension(&vector, "image");
        Ok(vector)
    }

    fn check_dimension(&self, vector: &[f32], kind: &str) {
        if vector.len() != self.dimension {
            warn!(
                kind,
                expected = self.dimension,
                actual = vector.len(),
                "embedding dimension mismatch"
            );
        }
    }
}
