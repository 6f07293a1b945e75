//! Retrieval request options, result DTOs and running statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::ImageFormat;
use crate::modality::Modality;
use crate::vector::{PayloadFilter, SearchHit};

/// Options for a single-modality search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: Option<f32>,
    pub filter: Option<PayloadFilter>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: None,
            filter: None,
        }
    }
}

/// Options for a search spanning both collections.
#[derive(Debug, Clone, PartialEq)]
pub struct MultimodalSearchOptions {
    pub limit: usize,
    pub threshold: Option<f32>,
    pub include_text: bool,
    pub include_images: bool,
    pub boost_text_results: bool,
    pub boost_image_results: bool,
    pub filter: Option<PayloadFilter>,
}

impl Default for MultimodalSearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: None,
            include_text: true,
            include_images: true,
            boost_text_results: false,
            boost_image_results: false,
            filter: None,
        }
    }
}

/// Multipliers applied to a modality's raw scores before merging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostFactors {
    pub text: f32,
    pub image: f32,
}

impl Default for BoostFactors {
    fn default() -> Self {
        Self {
            text: 1.2,
            image: 1.2,
        }
    }
}

/// Caller-facing search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedItem {
    pub id: Uuid,
    pub score: f32,
    pub modality: Modality,
    pub document_id: Uuid,
    pub file_path: String,
    pub document_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_format: Option<ImageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl From<SearchHit> for RetrievedItem {
    fn from(hit: SearchHit) -> Self {
        let p = hit.payload;
        Self {
            id: hit.id,
            score: hit.score,
            modality: hit.modality,
            document_id: p.document_id,
            file_path: p.file_path,
            document_title: p.document_title,
            content: p.content,
            chunk_index: p.chunk_index,
            page_number: p.page_number,
            image_format: p.image_format,
            width: p.width,
            height: p.height,
            caption: p.caption,
        }
    }
}

/// Running statistics for the retrieval service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalStats {
    pub total_queries: u64,
    pub average_response_ms: f64,
    pub last_query_at: Option<DateTime<Utc>>,
    pub text_collection_size: Option<u64>,
    pub image_collection_size: Option<u64>,
}
