//! Text chunker trait.

use mosaic_types::error::ChunkingError;
use mosaic_types::indexing::ChunkSpec;

/// A contiguous slice of the source text, with byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
    pub content: String,
}

/// Port for splitting text into overlapping chunks.
///
/// Spans must be returned in order and together cover the text without gaps.
pub trait TextChunker: Send + Sync {
    fn chunk(&self, text: &str, spec: ChunkSpec) -> Result<Vec<ChunkSpan>, ChunkingError>;
}

/// Page number for a chunk when the parser reported no page offsets.
///
/// Assumes roughly three chunks per page.
pub fn estimate_page(chunk_index: usize) -> u32 {
    (chunk_index / 3) as u32 + 1
}
