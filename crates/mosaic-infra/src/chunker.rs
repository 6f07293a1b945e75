//! Semantic text chunker for document content.
//!
//! Uses the `text-splitter` crate. Markdown documents use `MarkdownSplitter`
//! for heading-aware splitting; all other text uses `TextSplitter`. Chunk
//! capacity is measured in characters and whitespace is kept, so each span is
//! an exact slice of the input. Spans holding only whitespace are dropped.

use mosaic_core::indexing::chunker::{ChunkSpan, TextChunker};
use mosaic_types::error::ChunkingError;
use mosaic_types::indexing::ChunkSpec;
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};

/// `TextChunker` backed by `text-splitter`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitterChunker;

impl SplitterChunker {
    pub fn new() -> Self {
        Self
    }
}

fn chunk_config(spec: ChunkSpec) -> Result<ChunkConfig<text_splitter::Characters>, ChunkingError> {
    if !spec.is_valid() {
        return Err(ChunkingError::InvalidConfig {
            size: spec.size,
            overlap: spec.overlap,
        });
    }
    ChunkConfig::new(spec.size)
        .with_overlap(spec.overlap)
        .map(|config| config.with_trim(false))
        .map_err(|e| ChunkingError::Splitter(e.to_string()))
}

fn to_span((start, content): (usize, &str)) -> ChunkSpan {
    ChunkSpan {
        start,
        end: start + content.len(),
        content: content.to_string(),
    }
}

impl TextChunker for SplitterChunker {
    fn chunk(&self, text: &str, spec: ChunkSpec) -> Result<Vec<ChunkSpan>, ChunkingError> {
        let config = chunk_config(spec)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut spans: Vec<ChunkSpan> = if spec.markdown {
            MarkdownSplitter::new(config).chunk_indices(text).map(to_span).collect()
        } else {
            TextSplitter::new(config).chunk_indices(text).map(to_span).collect()
        };
        // Untrimmed splitting emits blank-line runs as chunks of their own.
        spans.retain(|span| !span.content.trim().is_empty());

        tracing::trace!(chunks = spans.len(), markdown = spec.markdown, "text chunked");
        Ok(spans)
    }
}
