//! Embedding backend trait.
//!
//! A backend wraps one model-inference engine that maps text and images into
//! the same vector space. Implementations (local ONNX CLIP, remote CLIP
//! service) live in mosaic-infra.

use mosaic_types::document::ImageFormat;
use mosaic_types::error::EmbeddingError;

/// Port for a multimodal inference engine.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait EmbeddingBackend: Send + Sync {
    /// Load model weights or verify the remote service. Called once by the
    /// provider's init guard.
    fn load(&self) -> impl std::future::Future<Output = Result<(), EmbeddingError>> + Send;

    /// Embed a single text.
    fn embed_text(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Embed a single encoded image. `format` is the sniffed encoding.
    fn embed_image(
        &self,
        bytes: &[u8],
        format: ImageFormat,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Model identifier reported in stats and logs.
    fn model_name(&self) -> &str;
}
