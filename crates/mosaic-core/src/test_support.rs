//! Hand-written doubles for the core ports, shared by the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use mosaic_types::document::{DocumentMetadata, ImageAsset, ImageFormat, ParsedDocument};
use mosaic_types::error::{
    ChunkingError, EmbeddingError, KeywordIndexError, ParseError, VectorStoreError,
};
use mosaic_types::indexing::{ChunkSpec, KeywordHit, KeywordRecord};
use mosaic_types::modality::Modality;
use mosaic_types::vector::{
    CollectionSpec, PayloadFilter, QueryOptions, RecordPayload, ScoredPoint, VectorRecord,
};
use uuid::Uuid;

use crate::embedding::backend::EmbeddingBackend;
use crate::indexing::chunker::{ChunkSpan, TextChunker};
use crate::indexing::keyword::KeywordIndex;
use crate::indexing::parser::DocumentParser;
use crate::vector::backend::VectorBackend;

pub const DIM: usize = 8;

// --- Vector backend ---

struct Collection {
    points: BTreeMap<Uuid, VectorRecord>,
}

#[derive(Default)]
struct MemoryInner {
    collections: Mutex<HashMap<String, Collection>>,
    upsert_sizes: Mutex<Vec<usize>>,
    fail_upsert_call: Mutex<Option<usize>>,
    failing_search: Mutex<HashSet<String>>,
    unhealthy: AtomicBool,
    create_calls: AtomicUsize,
}

/// In-memory vector backend that records upserts and can fail on demand.
///
/// Search returns every matching point unsorted and ignores the threshold so
/// tests exercise the store's own ranking.
#[derive(Clone, Default)]
pub struct MemoryVectorBackend {
    inner: Arc<MemoryInner>,
}

impl MemoryVectorBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th upsert call (1-based, counted across collections).
    pub fn fail_upsert_on(&self, n: usize) {
        *self.inner.fail_upsert_call.lock().unwrap() = Some(n);
    }

    pub fn fail_search_in(&self, collection: &str) {
        self.inner
            .failing_search
            .lock()
            .unwrap()
            .insert(collection.to_string());
    }

    pub fn set_unhealthy(&self) {
        self.inner.unhealthy.store(true, Ordering::SeqCst);
    }

    pub fn upsert_sizes(&self) -> Vec<usize> {
        self.inner.upsert_sizes.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.inner.create_calls.load(Ordering::SeqCst)
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.collections.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }

    pub fn records(&self, collection: &str) -> Vec<VectorRecord> {
        self.inner
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|c| c.points.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Insert raw points directly, bypassing the store.
    pub fn seed(&self, collection: &str, records: Vec<VectorRecord>) {
        let mut guard = self.inner.collections.lock().unwrap();
        let coll = guard.entry(collection.to_string()).or_insert_with(|| Collection {
            points: BTreeMap::new(),
        });
        for r in records {
            coll.points.insert(r.id, r);
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

impl VectorBackend for MemoryVectorBackend {
    async fn health(&self) -> Result<(), VectorStoreError> {
        if self.inner.unhealthy.load(Ordering::SeqCst) {
            return Err(VectorStoreError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        Ok(self.collection_names())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), VectorStoreError> {
        self.inner.create_calls.fetch_add(1, Ordering::SeqCst);
        // Let a concurrent provisioner observe the same listing first.
        tokio::task::yield_now().await;
        let mut guard = self.inner.collections.lock().unwrap();
        if guard.contains_key(&spec.name) {
            return Err(VectorStoreError::AlreadyExists(spec.name.clone()));
        }
        guard.insert(
            spec.name.clone(),
            Collection {
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        match self.inner.collections.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(VectorStoreError::CollectionNotFound(name.to_string())),
        }
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        let call = {
            let mut sizes = self.inner.upsert_sizes.lock().unwrap();
            sizes.push(records.len());
            sizes.len()
        };
        if *self.inner.fail_upsert_call.lock().unwrap() == Some(call) {
            return Err(VectorStoreError::Backend("injected upsert failure".to_string()));
        }
        let mut guard = self.inner.collections.lock().unwrap();
        let coll = guard
            .get_mut(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        for r in records {
            coll.points.insert(r.id, r.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        if self.inner.failing_search.lock().unwrap().contains(collection) {
            return Err(VectorStoreError::Backend("injected search failure".to_string()));
        }
        let guard = self.inner.collections.lock().unwrap();
        let coll = guard
            .get(collection)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))?;
        Ok(coll
            .points
            .values()
            .filter(|r| options.filter.as_ref().is_none_or(|f| f.matches(&r.payload)))
            .map(|r| ScoredPoint {
                id: r.id,
                score: cosine(&r.vector, vector),
                payload: r.payload.clone(),
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError> {
        let guard = self.inner.collections.lock().unwrap();
        guard
            .get(collection)
            .map(|c| c.points.len() as u64)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(collection.to_string()))
    }

    async fn delete_by_filter(&self, collection: &str, filter: &PayloadFilter) -> Result<(), VectorStoreError> {
        let mut guard = self.inner.collections.lock().unwrap();
        if let Some(coll) = guard.get_mut(collection) {
            coll.points.retain(|_, r| !filter.matches(&r.payload));
        }
        Ok(())
    }
}

// --- Embedding backend ---

#[derive(Default)]
struct StubEmbedderInner {
    text_calls: AtomicUsize,
    image_calls: AtomicUsize,
    fixed: Mutex<HashMap<String, Vec<f32>>>,
    fail_load: AtomicBool,
}

/// Deterministic embedder. Inputs containing `FAIL` error out.
#[derive(Clone, Default)]
pub struct StubEmbedder {
    inner: Arc<StubEmbedderInner>,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the vector returned for an exact text input.
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.inner
            .fixed
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
        self
    }

    pub fn failing_load(self) -> Self {
        self.inner.fail_load.store(true, Ordering::SeqCst);
        self
    }

    pub fn text_calls(&self) -> usize {
        self.inner.text_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.inner.image_calls.load(Ordering::SeqCst)
    }
}

pub fn hash_vector(bytes: &[u8]) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for (i, b) in bytes.iter().enumerate() {
        v[(*b as usize + i) % DIM] += 1.0;
    }
    v
}

impl EmbeddingBackend for StubEmbedder {
    async fn load(&self) -> Result<(), EmbeddingError> {
        if self.inner.fail_load.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Load("model unavailable".to_string()));
        }
        Ok(())
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.text_calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("FAIL") {
            return Err(EmbeddingError::Inference(format!("cannot embed '{text}'")));
        }
        if let Some(v) = self.inner.fixed.lock().unwrap().get(text) {
            return Ok(v.clone());
        }
        Ok(hash_vector(text.as_bytes()))
    }

    async fn embed_image(&self, bytes: &[u8], _format: ImageFormat) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.image_calls.fetch_add(1, Ordering::SeqCst);
        if bytes.windows(4).any(|w| w == b"FAIL") {
            return Err(EmbeddingError::Inference("corrupt image".to_string()));
        }
        Ok(hash_vector(bytes))
    }

    fn model_name(&self) -> &str {
        "stub-clip"
    }
}

// --- Parser ---

/// Parser returning canned documents by path. A path registered with
/// `panicking` panics when parsed.
#[derive(Default)]
pub struct StubParser {
    documents: HashMap<String, ParsedDocument>,
    panicking: HashSet<String>,
}

impl StubParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: &str, doc: ParsedDocument) -> Self {
        self.documents.insert(path.to_string(), doc);
        self
    }

    pub fn panicking(mut self, path: &str) -> Self {
        self.panicking.insert(path.to_string());
        self
    }
}

impl DocumentParser for StubParser {
    async fn parse(&self, path: &Path) -> Result<ParsedDocument, ParseError> {
        let key = path.to_string_lossy().to_string();
        if self.panicking.contains(&key) {
            panic!("parser crashed on {key}");
        }
        self.documents
            .get(&key)
            .cloned()
            .ok_or(ParseError::NotFound(key))
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Parsed document with the given text and images.
pub fn parsed(text: &str, images: Vec<ImageAsset>) -> ParsedDocument {
    ParsedDocument {
        text: text.to_string(),
        images,
        metadata: DocumentMetadata {
            title: Some("Test Document".to_string()),
            page_count: 1,
            page_offsets: Vec::new(),
            size_bytes: text.len() as u64,
            created_at: None,
            modified_at: None,
        },
    }
}

pub fn png_asset(marker: &[u8]) -> ImageAsset {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(marker);
    ImageAsset {
        document_id: Uuid::nil(),
        page_number: 1,
        bytes,
        format: ImageFormat::Png,
        width: Some(32),
        height: Some(16),
        caption: Some("figure".to_string()),
    }
}

// --- Chunker ---

/// Fixed-window chunker over characters: `size` chars per chunk, stepping by
/// `size - overlap`.
pub struct WindowChunker;

impl TextChunker for WindowChunker {
    fn chunk(&self, text: &str, spec: ChunkSpec) -> Result<Vec<ChunkSpan>, ChunkingError> {
        if !spec.is_valid() {
            return Err(ChunkingError::InvalidConfig {
                size: spec.size,
                overlap: spec.overlap,
            });
        }
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let chars = bounds.len() - 1;
        let step = spec.size - spec.overlap;
        let mut spans = Vec::new();
        let mut start = 0;
        while start < chars {
            let end = (start + spec.size).min(chars);
            spans.push(ChunkSpan {
                start: bounds[start],
                end: bounds[end],
                content: text[bounds[start]..bounds[end]].to_string(),
            });
            if end == chars {
                break;
            }
            start += step;
        }
        Ok(spans)
    }
}

/// Chunker that splits on `|`, producing non-overlapping spans. Lets tests
/// control chunk content exactly.
pub struct PipeChunker;

impl TextChunker for PipeChunker {
    fn chunk(&self, text: &str, spec: ChunkSpec) -> Result<Vec<ChunkSpan>, ChunkingError> {
        if !spec.is_valid() {
            return Err(ChunkingError::InvalidConfig {
                size: spec.size,
                overlap: spec.overlap,
            });
        }
        let mut spans = Vec::new();
        let mut offset = 0;
        for part in text.split('|') {
            let end = offset + part.len();
            if !part.is_empty() {
                spans.push(ChunkSpan {
                    start: offset,
                    end,
                    content: part.to_string(),
                });
            }
            offset = end + 1;
        }
        Ok(spans)
    }
}

// --- Keyword index ---

#[derive(Default)]
struct KeywordInner {
    records: Mutex<Vec<KeywordRecord>>,
    fail: AtomicBool,
}

/// Keyword index that records what it receives.
#[derive(Clone, Default)]
pub struct RecordingKeywordIndex {
    inner: Arc<KeywordInner>,
}

impl RecordingKeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self) -> Self {
        self.inner.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn records(&self) -> Vec<KeywordRecord> {
        self.inner.records.lock().unwrap().clone()
    }
}

impl KeywordIndex for RecordingKeywordIndex {
    async fn add_chunks(&self, records: &[KeywordRecord]) -> Result<usize, KeywordIndexError> {
        if self.inner.fail.load(Ordering::SeqCst) {
            return Err(KeywordIndexError::Connection("database is locked".to_string()));
        }
        self.inner.records.lock().unwrap().extend_from_slice(records);
        Ok(records.len())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>, KeywordIndexError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.content.contains(query))
            .take(limit)
            .map(|r| KeywordHit {
                id: r.id,
                document_id: r.document_id,
                file_path: r.file_path,
                document_title: r.document_title,
                chunk_index: r.chunk_index,
                page_number: r.page_number,
                snippet: r.content,
                rank: 0.0,
            })
            .collect())
    }

    async fn delete_document(&self, document_id: &Uuid) -> Result<u64, KeywordIndexError> {
        let mut guard = self.inner.records.lock().unwrap();
        let before = guard.len();
        guard.retain(|r| &r.document_id != document_id);
        Ok((before - guard.len()) as u64)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

// --- Records ---

/// A text record with the given id byte, vector and document.
pub fn text_record(id: u8, vector: Vec<f32>, document_id: Uuid) -> VectorRecord {
    record(id, vector, document_id, Modality::Text)
}

pub fn record(id: u8, vector: Vec<f32>, document_id: Uuid, modality: Modality) -> VectorRecord {
    let mut bytes = [0u8; 16];
    bytes[15] = id;
    VectorRecord {
        id: Uuid::from_bytes(bytes),
        vector,
        payload: RecordPayload {
            document_id,
            file_path: "/docs/test.txt".to_string(),
            content_type: modality,
            chunk_index: Some(id as usize),
            page_number: Some(1),
            created_at: Utc::now(),
            document_title: "Test".to_string(),
            content: (modality == Modality::Text).then(|| format!("chunk {id}")),
            start_offset: None,
            end_offset: None,
            image_format: (modality == Modality::Image).then_some(ImageFormat::Png),
            width: None,
            height: None,
            caption: None,
            extensions: Default::default(),
        },
    }
}

/// Unit vector along axis `i`.
pub fn axis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i] = 1.0;
    v
}
