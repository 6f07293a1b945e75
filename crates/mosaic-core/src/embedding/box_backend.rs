//! BoxEmbeddingBackend -- object-safe dynamic dispatch wrapper for EmbeddingBackend.
//!
//! 1. Define an object-safe `EmbeddingBackendDyn` trait with boxed futures
//! 2. Blanket-impl `EmbeddingBackendDyn` for all `T: EmbeddingBackend`
//! 3. `BoxEmbeddingBackend` wraps `Box<dyn EmbeddingBackendDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use mosaic_types::document::ImageFormat;
use mosaic_types::error::EmbeddingError;

use super::backend::EmbeddingBackend;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`EmbeddingBackend`] with boxed futures.
pub trait EmbeddingBackendDyn: Send + Sync {
    fn load_boxed(&self) -> BoxFuture<'_, Result<(), EmbeddingError>>;

    fn embed_text_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>>;

    fn embed_image_boxed<'a>(
        &'a self,
        bytes: &'a [u8],
        format: ImageFormat,
    ) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>>;

    fn model_name_dyn(&self) -> &str;
}

impl<T: EmbeddingBackend> EmbeddingBackendDyn for T {
    fn load_boxed(&self) -> BoxFuture<'_, Result<(), EmbeddingError>> {
        Box::pin(self.load())
    }

    fn embed_text_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        Box::pin(self.embed_text(text))
    }

    fn embed_image_boxed<'a>(
        &'a self,
        bytes: &'a [u8],
        format: ImageFormat,
    ) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        Box::pin(self.embed_image(bytes, format))
    }

    fn model_name_dyn(&self) -> &str {
        self.model_name()
    }
}

/// Type-erased embedding backend for runtime selection (fastembed or the
/// CLIP HTTP service, chosen from config).
///
/// Implements [`EmbeddingBackend`] itself so it can be plugged into the
/// generic `EmbeddingProvider`.
pub struct BoxEmbeddingBackend {
    inner: Box<dyn EmbeddingBackendDyn>,
}

impl BoxEmbeddingBackend {
    pub fn new<T: EmbeddingBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }
}

impl EmbeddingBackend for BoxEmbeddingBackend {
    async fn load(&self) -> Result<(), EmbeddingError> {
        self.inner.load_boxed().await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.embed_text_boxed(text).await
    }

    async fn embed_image(&self, bytes: &[u8], format: ImageFormat) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.embed_image_boxed(bytes, format).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }
}
