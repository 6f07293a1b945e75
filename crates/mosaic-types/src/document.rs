//! Transient document types produced while indexing a single file.
//!
//! None of these are persisted. They live for the duration of one
//! `index_file` call; only the vector records derived from them survive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Derive a stable document id from its source path.
///
/// The id is the first 16 bytes of the SHA-256 digest of the path, so the
/// same file always maps to the same id and re-indexing replaces records
/// instead of duplicating them.
pub fn document_id_for_path(path: &str) -> Uuid {
    let digest = Sha256::digest(path.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Handle for the document currently being indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_path: String,
    pub title: String,
    pub size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Build the handle from a path and the parser's metadata.
    ///
    /// Falls back to the file name when the parser found no title.
    pub fn from_parsed(source_path: &str, metadata: &DocumentMetadata) -> Self {
        let title = metadata.title.clone().unwrap_or_else(|| {
            std::path::Path::new(source_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source_path.to_string())
        });

        Self {
            id: document_id_for_path(source_path),
            source_path: source_path.to_string(),
            title,
            size_bytes: metadata.size_bytes,
            created_at: metadata.created_at,
            modified_at: metadata.modified_at,
        }
    }
}

/// A contiguous piece of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub document_id: Uuid,
    pub index: usize,
    pub content: String,
    pub page_number: u32,
    /// Byte offset into the parsed text.
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Encoding of an image, sniffed from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
    Unknown,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Unknown => "application/octet-stream",
        }
    }

    /// Map a file extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::Webp),
            "gif" => Some(ImageFormat::Gif),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Webp => write!(f, "webp"),
            ImageFormat::Gif => write!(f, "gif"),
            ImageFormat::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(ImageFormat::Unknown),
            other => {
                ImageFormat::from_extension(other).ok_or_else(|| format!("invalid image format: '{other}'"))
            }
        }
    }
}

/// An image extracted from a document (or a standalone image file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    pub document_id: Uuid,
    pub page_number: u32,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub caption: Option<String>,
}

/// Metadata reported by the parser alongside the extracted content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub page_count: u32,
    /// Byte offset where each page starts in the extracted text. Empty when
    /// the format has no page structure.
    #[serde(default)]
    pub page_offsets: Vec<usize>,
    pub size_bytes: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl DocumentMetadata {
    /// The 1-based page containing `offset`, or `None` without page offsets.
    pub fn page_for_offset(&self, offset: usize) -> Option<u32> {
        if self.page_offsets.is_empty() {
            return None;
        }
        let idx = self.page_offsets.partition_point(|&start| start <= offset);
        Some(idx.max(1) as u32)
    }
}

/// Parser output for one file. Images carry a placeholder document id that
/// the indexer overwrites with the derived one.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub text: String,
    pub images: Vec<ImageAsset>,
    pub metadata: DocumentMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_deterministic() {
        let a = document_id_for_path("/tmp/report.pdf");
        let b = document_id_for_path("/tmp/report.pdf");
        let c = document_id_for_path("/tmp/other.pdf");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_document_title_falls_back_to_file_name() {
        let meta = DocumentMetadata::default();
        let doc = Document::from_parsed("/data/notes.md", &meta);
        assert_eq!(doc.title, "notes.md");
        assert_eq!(doc.id, document_id_for_path("/data/notes.md"));
    }

    #[test]
    fn test_page_for_offset() {
        let meta = DocumentMetadata {
            page_offsets: vec![0, 100, 250],
            ..Default::default()
        };
        assert_eq!(meta.page_for_offset(0), Some(1));
        assert_eq!(meta.page_for_offset(99), Some(1));
        assert_eq!(meta.page_for_offset(100), Some(2));
        assert_eq!(meta.page_for_offset(1000), Some(3));
        assert_eq!(DocumentMetadata::default().page_for_offset(10), None);
    }

    #[test]
    fn test_image_format_parse() {
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::Webp.to_string(), "webp");
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert!("tiff".parse::<ImageFormat>().is_err());
    }
}
