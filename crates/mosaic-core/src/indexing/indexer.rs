//! Indexer: drives parse -> chunk -> embed -> store for each document.
//!
//! Failures are graded. A parser failure ends the document. A failed
//! embedding drops that one item. A failed write drops that modality. The
//! keyword index is written last and can never undo vector storage. Every
//! failure ends up as a string in `IndexingResult::errors`; the pipeline
//! itself never returns `Err`.
//!
//! Re-indexing a path replaces its document: the id comes from the
//! normalized path, and the previous records are deleted before the new ones
//! are written.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use mosaic_types::document::{Document, ImageAsset, TextChunk, document_id_for_path};
use mosaic_types::error::{ChunkingError, IndexingError, VectorStoreError};
use mosaic_types::indexing::{
    ChunkSpec, IndexOptions, IndexStage, IndexingResult, KeywordRecord, ProgressUpdate,
};
use mosaic_types::modality::Modality;
use mosaic_types::vector::{PayloadFilter, RecordPayload, VectorRecord, record_id};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::chunker::{TextChunker, estimate_page};
use super::keyword::KeywordIndex;
use super::parser::DocumentParser;
use super::progress::ProgressHandler;
use crate::embedding::backend::EmbeddingBackend;
use crate::embedding::provider::EmbeddingProvider;
use crate::vector::backend::VectorBackend;
use crate::vector::store::VectorStore;

/// Defaults applied when `IndexOptions` leaves a field unset.
#[derive(Debug, Clone, Copy)]
pub struct IndexerSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extract_images: bool,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            extract_images: true,
        }
    }
}

/// Sends progress updates for one file, if anyone is listening.
struct Reporter<'a> {
    handler: Option<&'a dyn ProgressHandler>,
    file_path: &'a str,
    start: Instant,
}

impl Reporter<'_> {
    fn emit(&self, stage: IndexStage, progress: u8, current_item: Option<String>) {
        if let Some(handler) = self.handler {
            handler.on_progress(ProgressUpdate {
                file_path: self.file_path.to_string(),
                stage,
                progress: progress.min(100),
                current_item,
                elapsed_ms: self.start.elapsed().as_millis() as u64,
            });
        }
    }
}

/// Scale `done / total` into the `[from, to]` progress band.
fn band(from: u8, to: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return to;
    }
    let span = (to - from) as usize;
    from + (span * done / total) as u8
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_lowercase().as_str(), "md" | "markdown"))
}

/// The spelling a document id is derived from: the canonical path when the
/// file exists, otherwise the absolute path with `.` and `..` folded away.
pub async fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = tokio::fs::canonicalize(path).await {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Orchestrates the per-document indexing pipeline.
///
/// Generic over the parser, chunker, embedding backend, vector backend and
/// keyword index. Embedding provider and vector store are shared with the
/// retrieval service through `Arc`.
pub struct Indexer<P, C, E, V, K>
where
    P: DocumentParser,
    C: TextChunker,
    E: EmbeddingBackend,
    V: VectorBackend,
    K: KeywordIndex,
{
    parser: P,
    chunker: C,
    embeddings: Arc<EmbeddingProvider<E>>,
    vectors: Arc<VectorStore<V>>,
    keywords: K,
    settings: IndexerSettings,
}

impl<P, C, E, V, K> Indexer<P, C, E, V, K>
where
    P: DocumentParser,
    C: TextChunker,
    E: EmbeddingBackend,
    V: VectorBackend,
    K: KeywordIndex,
{
    pub fn new(
        parser: P,
        chunker: C,
        embeddings: Arc<EmbeddingProvider<E>>,
        vectors: Arc<VectorStore<V>>,
        keywords: K,
        settings: IndexerSettings,
    ) -> Self {
        Self {
            parser,
            chunker,
            embeddings,
            vectors,
            keywords,
            settings,
        }
    }

    /// Initialize the embedding provider and the vector store.
    pub async fn initialize(&self) -> Result<(), IndexingError> {
        self.embeddings.initialize().await?;
        self.vectors.initialize().await?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.parser.is_ready()
            && self.embeddings.is_ready()
            && self.vectors.is_ready()
            && self.keywords.is_ready()
    }

    pub fn keywords(&self) -> &K {
        &self.keywords
    }

    /// Index one file. Never fails: problems are reported in the result.
    pub async fn index_file(
        &self,
        path: &Path,
        options: &IndexOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> IndexingResult {
        let path = normalize_path(path).await;
        let file_path = path.to_string_lossy().into_owned();
        let document_id = document_id_for_path(&file_path);
        let span = info_span!("index_file", document_id = %document_id, file = %file_path);

        self.run_pipeline(&path, &file_path, options, progress)
            .instrument(span)
            .await
    }

    async fn run_pipeline(
        &self,
        path: &Path,
        file_path: &str,
        options: &IndexOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> IndexingResult {
        let start = Instant::now();
        let reporter = Reporter {
            handler: progress,
            file_path,
            start,
        };
        let elapsed = || start.elapsed().as_millis() as u64;

        // Parse
        reporter.emit(IndexStage::Parse, 0, None);
        let parsed = match self.parser.parse(path).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "parse failed");
                reporter.emit(IndexStage::Error, 100, None);
                return IndexingResult::failed(
                    document_id_for_path(file_path),
                    file_path,
                    elapsed(),
                    format!("parse failed: {e}"),
                );
            }
        };
        let document = Document::from_parsed(file_path, &parsed.metadata);
        debug!(
            title = %document.title,
            text_bytes = parsed.text.len(),
            images = parsed.images.len(),
            "parsed document"
        );

        // Chunk
        reporter.emit(IndexStage::Chunk, 10, None);
        let spec = ChunkSpec::new(
            options.chunk_size.unwrap_or(self.settings.chunk_size),
            options.chunk_overlap.unwrap_or(self.settings.chunk_overlap),
        )
        .with_markdown(is_markdown(path));
        if !spec.is_valid() {
            let err = ChunkingError::InvalidConfig {
                size: spec.size,
                overlap: spec.overlap,
            };
            warn!(error = %err, "invalid chunk configuration");
            reporter.emit(IndexStage::Error, 100, None);
            return IndexingResult::failed(document.id, file_path, elapsed(), err.to_string());
        }

        let spans = if parsed.text.trim().is_empty() {
            Vec::new()
        } else {
            match self.chunker.chunk(&parsed.text, spec) {
                Ok(spans) => spans,
                Err(e) => {
                    warn!(error = %e, "chunking failed");
                    reporter.emit(IndexStage::Error, 100, None);
                    return IndexingResult::failed(document.id, file_path, elapsed(), e.to_string());
                }
            }
        };
        let chunks: Vec<TextChunk> = spans
            .into_iter()
            .filter(|span| !span.content.trim().is_empty())
            .enumerate()
            .map(|(index, span)| TextChunk {
                document_id: document.id,
                index,
                page_number: parsed
                    .metadata
                    .page_for_offset(span.start)
                    .unwrap_or_else(|| estimate_page(index)),
                content: span.content,
                start_offset: span.start,
                end_offset: span.end,
            })
            .collect();

        let indexed_at = Utc::now();
        let mut errors = Vec::new();

        // Embed text, one chunk at a time
        let total_chunks = chunks.len();
        let mut text_records = Vec::with_capacity(total_chunks);
        for chunk in &chunks {
            reporter.emit(
                IndexStage::EmbedText,
                band(20, 60, chunk.index, total_chunks),
                Some(format!("chunk {}/{}", chunk.index + 1, total_chunks)),
            );
            match self.embeddings.embed_text(&chunk.content).await {
                Ok(vector) => text_records.push(text_record(&document, chunk, vector, indexed_at)),
                Err(e) => {
                    warn!(chunk_index = chunk.index, error = %e, "chunk embedding failed");
                    errors.push(format!("chunk {}: {e}", chunk.index));
                }
            }
        }

        // Embed images
        let extract_images = options.extract_images.unwrap_or(self.settings.extract_images);
        let mut image_records = Vec::new();
        if extract_images {
            let total_images = parsed.images.len();
            for (i, image) in parsed.images.iter().enumerate() {
                reporter.emit(
                    IndexStage::EmbedImage,
                    band(60, 80, i, total_images),
                    Some(format!("image {}/{}", i + 1, total_images)),
                );
                match self.embeddings.embed_image(&image.bytes).await {
                    Ok(vector) => image_records.push(image_record(&document, i, image, vector, indexed_at)),
                    Err(e) => {
                        warn!(image_index = i, error = %e, "image embedding failed");
                        errors.push(format!("image {i}: {e}"));
                    }
                }
            }
        }

        // Replace whatever an earlier run stored for this document
        reporter.emit(IndexStage::Store, 80, None);
        self.clear_previous(&document.id, &mut errors).await;

        // Store each modality independently
        let text_stored = self.store_modality(Modality::Text, &text_records, &mut errors).await;
        let image_stored = self.store_modality(Modality::Image, &image_records, &mut errors).await;

        // Best-effort lexical index
        if text_stored > 0 {
            let keyword_records: Vec<KeywordRecord> =
                text_records[..text_stored].iter().map(keyword_record).collect();
            if let Err(e) = self.keywords.add_chunks(&keyword_records).await {
                warn!(error = %e, "keyword indexing failed");
                errors.push(format!("keyword index: {e}"));
            }
        }

        let total_vectors_stored = text_stored + image_stored;
        let success = total_vectors_stored > 0 && errors.is_empty();
        let result = IndexingResult {
            success,
            document_id: document.id,
            file_path: file_path.to_string(),
            processing_time_ms: elapsed(),
            text_chunks_processed: text_records.len(),
            images_processed: image_records.len(),
            total_vectors_stored,
            errors,
        };

        reporter.emit(
            if success { IndexStage::Done } else { IndexStage::Error },
            100,
            None,
        );
        info!(
            success,
            chunks = result.text_chunks_processed,
            images = result.images_processed,
            vectors = result.total_vectors_stored,
            errors = result.errors.len(),
            duration_ms = result.processing_time_ms,
            "indexed document"
        );
        result
    }

    /// Delete the document's vectors in both collections and its keyword
    /// entries. Failures are recorded and the new records are still written.
    async fn clear_previous(&self, document_id: &Uuid, errors: &mut Vec<String>) {
        let filter = PayloadFilter::for_document(document_id);
        for modality in Modality::ALL {
            if let Err(e) = self.vectors.delete_by_filter(modality, &filter).await {
                warn!(%modality, error = %e, "failed to remove previous records");
                errors.push(format!("{modality} cleanup failed: {e}"));
            }
        }
        match self.keywords.delete_document(document_id).await {
            Ok(removed) => debug!(removed, "removed previous keyword entries"),
            Err(e) => {
                warn!(error = %e, "failed to remove previous keyword entries");
                errors.push(format!("keyword index: {e}"));
            }
        }
    }

    /// Store one modality's records, returning how many were persisted. A
    /// failed batch still counts the batches written before it.
    async fn store_modality(&self, modality: Modality, records: &[VectorRecord], errors: &mut Vec<String>) -> usize {
        if records.is_empty() {
            return 0;
        }
        match self.vectors.store(modality, records).await {
            Ok(n) => n,
            Err(e) => {
                errors.push(format!("{modality} storage failed: {e}"));
                match e {
                    VectorStoreError::BatchFailed { persisted, .. } => persisted,
                    _ => 0,
                }
            }
        }
    }

    /// Index files one after another.
    ///
    /// A panic inside one file's pipeline becomes a failed result for that
    /// file; the remaining files are still processed.
    pub async fn index_files(
        &self,
        paths: &[PathBuf],
        options: &IndexOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> Vec<IndexingResult> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(paths.len());

        for path in paths {
            let file_start = Instant::now();
            let path = normalize_path(path).await;
            let outcome = AssertUnwindSafe(self.index_file(&path, options, progress))
                .catch_unwind()
                .await;
            match outcome {
                Ok(result) => results.push(result),
                Err(payload) => {
                    let file_path = path.to_string_lossy().into_owned();
                    let message = panic_message(payload.as_ref());
                    error!(file = %file_path, panic = %message, "indexing panicked");
                    Reporter {
                        handler: progress,
                        file_path: &file_path,
                        start: file_start,
                    }
                    .emit(IndexStage::Error, 100, None);
                    results.push(IndexingResult::failed(
                        document_id_for_path(&file_path),
                        &file_path,
                        file_start.elapsed().as_millis() as u64,
                        format!("unexpected failure: {message}"),
                    ));
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            files = paths.len(),
            succeeded,
            failed = paths.len() - succeeded,
            duration_ms = start.elapsed().as_millis() as u64,
            "batch indexing complete"
        );
        results
    }

    /// Remove a document's vectors (one modality or both) and its keyword
    /// entries.
    pub async fn remove_document(&self, document_id: &Uuid, modality: Option<Modality>) -> Result<(), IndexingError> {
        let filter = PayloadFilter::for_document(document_id);
        let modalities = match modality {
            Some(m) => vec![m],
            None => Modality::ALL.to_vec(),
        };
        for m in modalities {
            self.vectors.delete_by_filter(m, &filter).await?;
        }
        if modality.is_none_or(|m| m == Modality::Text) {
            let removed = self.keywords.delete_document(document_id).await?;
            debug!(document_id = %document_id, removed, "removed keyword entries");
        }
        Ok(())
    }
}

fn text_record(document: &Document, chunk: &TextChunk, vector: Vec<f32>, indexed_at: DateTime<Utc>) -> VectorRecord {
    VectorRecord {
        id: record_id(&document.id, Modality::Text, chunk.index),
        vector,
        payload: RecordPayload {
            document_id: document.id,
            file_path: document.source_path.clone(),
            content_type: Modality::Text,
            chunk_index: Some(chunk.index),
            page_number: Some(chunk.page_number),
            created_at: indexed_at,
            document_title: document.title.clone(),
            content: Some(chunk.content.clone()),
            start_offset: Some(chunk.start_offset),
            end_offset: Some(chunk.end_offset),
            image_format: None,
            width: None,
            height: None,
            caption: None,
            extensions: Default::default(),
        },
    }
}

fn image_record(
    document: &Document,
    index: usize,
    image: &ImageAsset,
    vector: Vec<f32>,
    indexed_at: DateTime<Utc>,
) -> VectorRecord {
    VectorRecord {
        id: record_id(&document.id, Modality::Image, index),
        vector,
        payload: RecordPayload {
            document_id: document.id,
            file_path: document.source_path.clone(),
            content_type: Modality::Image,
            chunk_index: Some(index),
            page_number: Some(image.page_number),
            created_at: indexed_at,
            document_title: document.title.clone(),
            content: None,
            start_offset: None,
            end_offset: None,
            image_format: Some(image.format),
            width: image.width,
            height: image.height,
            caption: image.caption.clone(),
            extensions: Default::default(),
        },
    }
}

fn keyword_record(record: &VectorRecord) -> KeywordRecord {
    let p = &record.payload;
    KeywordRecord {
        id: record.id,
        content: p.content.clone().unwrap_or_default(),
        document_id: p.document_id,
        file_path: p.file_path.clone(),
        chunk_index: p.chunk_index.unwrap_or_default(),
        page_number: p.page_number.unwrap_or(1),
        document_title: p.document_title.clone(),
        created_at: p.created_at,
    }
}
