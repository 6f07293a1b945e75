//! HTTP client for a remote CLIP embedding service.
//!
//! The service exposes `GET /health`, `POST /embed/text` and
//! `POST /embed/image` (base64-encoded image bytes). Text and image
//! embeddings share one vector space.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use mosaic_core::embedding::backend::EmbeddingBackend;
use mosaic_types::document::ImageFormat;
use mosaic_types::error::EmbeddingError;
use serde::{Deserialize, Serialize};

/// `EmbeddingBackend` over the CLIP HTTP service.
pub struct ClipServiceBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl ClipServiceBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Load(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_embed<T: Serialize>(&self, path: &str, body: &T) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Inference(format!("CLIP service request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Inference(format!("CLIP service returned {status}: {body}")));
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::UnexpectedResponse(e.to_string()))?;
        payload.into_single()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    texts: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    images_base64: [String; 1],
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    model_loaded: bool,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    embedding_dimension: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    model_loaded: Option<bool>,
}

impl EmbeddingResponse {
    fn into_single(self) -> Result<Vec<f32>, EmbeddingError> {
        if self.model_loaded == Some(false) {
            return Err(EmbeddingError::Inference("CLIP service has no model loaded".to_string()));
        }
        let vector = self
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::UnexpectedResponse("no embedding in response".to_string()))?;
        if let Some(dim) = self.dimension {
            if dim != vector.len() {
                return Err(EmbeddingError::UnexpectedResponse(format!(
                    "service reported dimension {dim} but returned {}",
                    vector.len()
                )));
            }
        }
        Ok(vector)
    }
}

// ---------------------------------------------------------------------------
// EmbeddingBackend implementation
// ---------------------------------------------------------------------------

impl EmbeddingBackend for ClipServiceBackend {
    async fn load(&self) -> Result<(), EmbeddingError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| EmbeddingError::Load(format!("CLIP service unreachable at {}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Load(format!(
                "CLIP service health check returned {}",
                response.status()
            )));
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::UnexpectedResponse(e.to_string()))?;
        if !health.model_loaded {
            return Err(EmbeddingError::Load(format!(
                "CLIP service is up (status '{}') but has no model loaded",
                health.status
            )));
        }

        tracing::info!(
            url = %self.base_url,
            device = health.device.as_deref().unwrap_or("unknown"),
            dimension = ?health.embedding_dimension,
            "CLIP service ready"
        );
        Ok(())
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.post_embed("/embed/text", &TextRequest { texts: [text] }).await
    }

    async fn embed_image(&self, bytes: &[u8], format: ImageFormat) -> Result<Vec<f32>, EmbeddingError> {
        tracing::trace!(format = %format, bytes = bytes.len(), "sending image to CLIP service");
        let body = ImageRequest {
            images_base64: [BASE64.encode(bytes)],
        };
        self.post_embed("/embed/image", &body).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
