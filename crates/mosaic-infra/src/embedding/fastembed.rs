//! FastEmbed-based local CLIP embedding backend.
//!
//! Implements `EmbeddingBackend` from `mosaic-core` using fastembed's CLIP
//! ViT-B/32 text and vision models (512 dimensions, one shared space) with
//! ONNX runtime inference. Models are downloaded into `cache_dir` on first
//! load. Inference is CPU-bound and runs on the blocking thread pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, TextEmbedding,
    TextInitOptions,
};
use mosaic_core::embedding::backend::EmbeddingBackend;
use mosaic_types::document::ImageFormat;
use mosaic_types::error::EmbeddingError;

/// Model name accepted in config.
pub const CLIP_VIT_B_32: &str = "clip-vit-b-32";

/// Output width of both CLIP ViT-B/32 encoders.
pub const CLIP_DIMENSION: usize = 512;

struct ClipModels {
    text: Arc<Mutex<TextEmbedding>>,
    image: Arc<Mutex<ImageEmbedding>>,
}

/// Local CLIP inference through fastembed.
pub struct FastEmbedClipBackend {
    cache_dir: PathBuf,
    model_name: String,
    models: OnceLock<ClipModels>,
}

impl FastEmbedClipBackend {
    /// Create an unloaded backend. Only `clip-vit-b-32` is available.
    pub fn new(cache_dir: PathBuf, model_name: &str) -> Result<Self, EmbeddingError> {
        if !model_name.eq_ignore_ascii_case(CLIP_VIT_B_32) {
            return Err(EmbeddingError::Load(format!(
                "unsupported model '{model_name}', expected '{CLIP_VIT_B_32}'"
            )));
        }
        Ok(Self {
            cache_dir,
            model_name: CLIP_VIT_B_32.to_string(),
            models: OnceLock::new(),
        })
    }

    fn models(&self) -> Result<&ClipModels, EmbeddingError> {
        self.models.get().ok_or(EmbeddingError::NotReady)
    }
}

fn first_vector(mut vectors: Vec<Vec<f32>>) -> Result<Vec<f32>, EmbeddingError> {
    if vectors.is_empty() {
        return Err(EmbeddingError::UnexpectedResponse("model returned no embedding".to_string()));
    }
    Ok(vectors.swap_remove(0))
}

fn join_error(e: tokio::task::JoinError) -> EmbeddingError {
    EmbeddingError::Inference(format!("inference task failed: {e}"))
}

impl EmbeddingBackend for FastEmbedClipBackend {
    async fn load(&self) -> Result<(), EmbeddingError> {
        if self.models.get().is_some() {
            return Ok(());
        }

        let cache_dir = self.cache_dir.clone();
        let started = std::time::Instant::now();
        let (text, image) = tokio::task::spawn_blocking(move || {
            let text = TextEmbedding::try_new(
                TextInitOptions::new(EmbeddingModel::ClipVitB32)
                    .with_cache_dir(cache_dir.clone())
                    .with_show_download_progress(false),
            )
            .map_err(|e| EmbeddingError::Load(format!("CLIP text model: {e}")))?;
            let image = ImageEmbedding::try_new(
                ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(false),
            )
            .map_err(|e| EmbeddingError::Load(format!("CLIP vision model: {e}")))?;
            Ok::<_, EmbeddingError>((text, image))
        })
        .await
        .map_err(|e| EmbeddingError::Load(format!("model loading task failed: {e}")))??;

        // A concurrent load may have won; either set of models is usable.
        let _ = self.models.set(ClipModels {
            text: Arc::new(Mutex::new(text)),
            image: Arc::new(Mutex::new(image)),
        });

        tracing::info!(
            model = %self.model_name,
            cache_dir = %self.cache_dir.display(),
            duration_ms = started.elapsed().as_millis() as u64,
            "CLIP models loaded"
        );
        Ok(())
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let model = Arc::clone(&self.models()?.text);
        let text = text.to_string();
        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Inference("text model lock poisoned".to_string()))?;
            model
                .embed(vec![text], None)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))
        })
        .await
        .map_err(join_error)??;
        first_vector(vectors)
    }

    async fn embed_image(&self, bytes: &[u8], format: ImageFormat) -> Result<Vec<f32>, EmbeddingError> {
        let model = Arc::clone(&self.models()?.image);
        let bytes = bytes.to_vec();
        tracing::trace!(format = %format, bytes = bytes.len(), "embedding image locally");
        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Inference("vision model lock poisoned".to_string()))?;
            model
                .embed_bytes(&[bytes.as_slice()], None)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))
        })
        .await
        .map_err(join_error)??;
        first_vector(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_model() {
        let err = FastEmbedClipBackend::new(PathBuf::from("/tmp/models"), "bge-small").err();
        assert!(matches!(err, Some(EmbeddingError::Load(_))));
    }

    #[test]
    fn test_model_name_is_normalized() {
        let backend = FastEmbedClipBackend::new(PathBuf::from("/tmp/models"), "CLIP-ViT-B-32").unwrap();
        assert_eq!(backend.model_name(), CLIP_VIT_B_32);
    }

    #[tokio::test]
    async fn test_embed_before_load_is_not_ready() {
        let backend = FastEmbedClipBackend::new(PathBuf::from("/tmp/models"), CLIP_VIT_B_32).unwrap();
        assert!(matches!(backend.embed_text("hello").await, Err(EmbeddingError::NotReady)));
        assert!(matches!(
            backend.embed_image(&[0xFF, 0xD8, 0xFF], ImageFormat::Jpeg).await,
            Err(EmbeddingError::NotReady)
        ));
    }

    #[test]
    fn test_first_vector() {
        assert_eq!(first_vector(vec![vec![1.0], vec![2.0]]).unwrap(), vec![1.0]);
        assert!(first_vector(Vec::new()).is_err());
    }
}
