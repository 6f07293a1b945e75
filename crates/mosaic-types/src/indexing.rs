//! Indexing options, progress reporting and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Per-call overrides for the indexing pipeline. `None` falls back to the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub extract_images: Option<bool>,
}

/// Size and overlap handed to the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub size: usize,
    pub overlap: usize,
    /// Split on markdown structure rather than plain text boundaries.
    #[serde(default)]
    pub markdown: bool,
}

impl ChunkSpec {
    pub fn new(size: usize, overlap: usize) -> Self {
        Self {
            size,
            overlap,
            markdown: false,
        }
    }

    pub fn with_markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.size > 0 && self.overlap < self.size
    }
}

/// Stage of the per-document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStage {
    Parse,
    Chunk,
    EmbedText,
    EmbedImage,
    Store,
    Done,
    Error,
}

impl fmt::Display for IndexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStage::Parse => write!(f, "parsing"),
            IndexStage::Chunk => write!(f, "chunking"),
            IndexStage::EmbedText => write!(f, "embedding text"),
            IndexStage::EmbedImage => write!(f, "embedding images"),
            IndexStage::Store => write!(f, "storing"),
            IndexStage::Done => write!(f, "done"),
            IndexStage::Error => write!(f, "error"),
        }
    }
}

/// Advisory progress notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub file_path: String,
    pub stage: IndexStage,
    /// 0 to 100.
    pub progress: u8,
    pub current_item: Option<String>,
    pub elapsed_ms: u64,
}

/// Outcome of indexing one document. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingResult {
    pub success: bool,
    pub document_id: Uuid,
    pub file_path: String,
    pub processing_time_ms: u64,
    pub text_chunks_processed: usize,
    pub images_processed: usize,
    pub total_vectors_stored: usize,
    pub errors: Vec<String>,
}

impl IndexingResult {
    /// A result for a document that failed before anything was stored.
    pub fn failed(document_id: Uuid, file_path: &str, processing_time_ms: u64, error: String) -> Self {
        Self {
            success: false,
            document_id,
            file_path: file_path.to_string(),
            processing_time_ms,
            text_chunks_processed: 0,
            images_processed: 0,
            total_vectors_stored: 0,
            errors: vec![error],
        }
    }
}

/// Chunk text registered with the keyword index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub id: Uuid,
    pub content: String,
    pub document_id: Uuid,
    pub file_path: String,
    pub chunk_index: usize,
    pub page_number: u32,
    pub document_title: String,
    pub created_at: DateTime<Utc>,
}

/// A lexical match from the keyword index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordHit {
    pub id: Uuid,
    pub document_id: Uuid,
    pub file_path: String,
    pub document_title: String,
    pub chunk_index: usize,
    pub page_number: u32,
    pub snippet: String,
    /// BM25 rank; lower is better.
    pub rank: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_spec_validity() {
        assert!(ChunkSpec::new(1000, 200).is_valid());
        assert!(!ChunkSpec::new(100, 100).is_valid());
        assert!(!ChunkSpec::new(0, 0).is_valid());
    }

    #[test]
    fn test_failed_result() {
        let r = IndexingResult::failed(Uuid::nil(), "/x.txt", 4, "boom".to_string());
        assert!(!r.success);
        assert_eq!(r.total_vectors_stored, 0);
        assert_eq!(r.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_stage_serde() {
        let json = serde_json::to_string(&IndexStage::EmbedText).unwrap();
        assert_eq!(json, "\"embed_text\"");
    }
}
