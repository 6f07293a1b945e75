//! Vector store: collection lifecycle, batched writes and thresholded
//! queries over a [`VectorBackend`].
//!
//! The store owns exactly two collections, `<prefix>_text_chunks` and
//! `<prefix>_image_embeddings`. Backends are free to ignore query options;
//! the store re-applies threshold, ordering and limit to whatever comes back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use mosaic_types::error::VectorStoreError;
use mosaic_types::modality::Modality;
use mosaic_types::vector::{
    CollectionSpec, CollectionStats, DistanceMetric, PayloadFilter, QueryOptions, SearchHit,
    VectorRecord,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::backend::VectorBackend;

/// Static layout of the store's collections.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub collection_prefix: String,
    pub dimension: usize,
    pub distance: DistanceMetric,
    pub batch_size: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            collection_prefix: "mosaic".to_string(),
            dimension: 512,
            distance: DistanceMetric::Cosine,
            batch_size: 100,
        }
    }
}

pub struct VectorStore<B: VectorBackend> {
    backend: B,
    settings: StoreSettings,
    init: OnceCell<Result<(), String>>,
    ready: AtomicBool,
}

impl<B: VectorBackend> VectorStore<B> {
    pub fn new(backend: B, settings: StoreSettings) -> Self {
        Self {
            backend,
            settings,
            init: OnceCell::new(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn collection_name(&self, modality: Modality) -> String {
        format!("{}_{}", self.settings.collection_prefix, modality.collection_suffix())
    }

    pub fn dimension(&self) -> usize {
        self.settings.dimension
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Check reachability and provision both collections. Idempotent; the
    /// outcome of the first attempt is shared by every caller.
    pub async fn initialize(&self) -> Result<(), VectorStoreError> {
        let outcome = self
            .init
            .get_or_init(|| async {
                let start = Instant::now();
                match self.provision().await {
                    Ok(()) => {
                        self.ready.store(true, Ordering::Release);
                        info!(
                            prefix = %self.settings.collection_prefix,
                            dimension = self.settings.dimension,
                            distance = %self.settings.distance,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "vector store initialized"
                        );
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "vector store failed to initialize");
                        Err(e.to_string())
                    }
                }
            })
            .await;

        outcome.clone().map_err(VectorStoreError::Unreachable)
    }

    async fn provision(&self) -> Result<(), VectorStoreError> {
        self.backend.health().await?;
        let existing = self.backend.list_collections().await?;

        for modality in Modality::ALL {
            let name = self.collection_name(modality);
            if existing.contains(&name) {
                debug!(collection = %name, "collection already present");
                continue;
            }
            self.create(&name).await?;
        }
        Ok(())
    }

    async fn create(&self, name: &str) -> Result<(), VectorStoreError> {
        let spec = CollectionSpec {
            name: name.to_string(),
            dimension: self.settings.dimension,
            distance: self.settings.distance,
        };
        match self.backend.create_collection(&spec).await {
            Ok(()) => {
                info!(collection = %name, dimension = spec.dimension, "created collection");
                Ok(())
            }
            // Lost a race with another provisioner.
            Err(VectorStoreError::AlreadyExists(_)) => {
                debug!(collection = %name, "collection created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn ensure_ready(&self) -> Result<(), VectorStoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(VectorStoreError::NotInitialized)
        }
    }

    /// Upsert records into one modality's collection.
    ///
    /// Records are written in batches of `batch_size`, strictly one after the
    /// other. A failing batch stops the write: earlier batches stay
    /// persisted, later ones are never sent.
    ///
    /// # Returns
    /// The number of records written.
    pub async fn store(&self, modality: Modality, records: &[VectorRecord]) -> Result<usize, VectorStoreError> {
        self.ensure_ready()?;
        if records.is_empty() {
            return Ok(0);
        }

        let mismatched = records
            .iter()
            .filter(|r| r.vector.len() != self.settings.dimension)
            .count();
        if mismatched > 0 {
            warn!(
                %modality,
                mismatched,
                expected = self.settings.dimension,
                "storing vectors with unexpected dimension"
            );
        }

        let collection = self.collection_name(modality);
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = records.len().div_ceil(batch_size);
        let mut persisted = 0;

        for (i, batch) in records.chunks(batch_size).enumerate() {
            if let Err(e) = self.backend.upsert(&collection, batch).await {
                warn!(
                    collection = %collection,
                    batch = i + 1,
                    total_batches,
                    persisted,
                    error = %e,
                    "upsert batch failed"
                );
                return Err(VectorStoreError::BatchFailed {
                    batch: i + 1,
                    total_batches,
                    persisted,
                    reason: e.to_string(),
                });
            }
            persisted += batch.len();
            debug!(collection = %collection, batch = i + 1, total_batches, "upserted batch");
        }

        info!(collection = %collection, count = persisted, "stored vectors");
        Ok(persisted)
    }

    /// Similarity search in one modality's collection.
    ///
    /// Hits are sorted by descending score, never below `threshold`, and at
    /// most `limit` long.
    pub async fn query(
        &self,
        modality: Modality,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        self.ensure_ready()?;
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let collection = self.collection_name(modality);
        let points = self.backend.search(&collection, vector, options).await?;

        let mut hits: Vec<SearchHit> = points
            .into_iter()
            .filter(|p| options.threshold.is_none_or(|t| p.score >= t))
            .map(|p| SearchHit {
                id: p.id,
                score: p.score,
                payload: p.payload,
                modality,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(options.limit);

        debug!(collection = %collection, hits = hits.len(), "query complete");
        Ok(hits)
    }

    /// Point count of one collection.
    pub async fn count(&self, modality: Modality) -> Result<u64, VectorStoreError> {
        self.backend.count(&self.collection_name(modality)).await
    }

    /// Per-collection counts. Missing collections are logged and omitted.
    pub async fn get_stats(&self) -> Result<Vec<CollectionStats>, VectorStoreError> {
        let mut stats = Vec::new();
        for modality in Modality::ALL {
            let name = self.collection_name(modality);
            match self.backend.count(&name).await {
                Ok(points_count) => stats.push(CollectionStats {
                    name,
                    modality,
                    points_count,
                }),
                Err(VectorStoreError::CollectionNotFound(_)) => {
                    warn!(collection = %name, "collection missing, omitted from stats");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(stats)
    }

    /// Delete every point matching `filter`. Best effort: the deletion is
    /// not verified.
    pub async fn delete_by_filter(&self, modality: Modality, filter: &PayloadFilter) -> Result<(), VectorStoreError> {
        self.ensure_ready()?;
        let collection = self.collection_name(modality);
        self.backend.delete_by_filter(&collection, filter).await?;
        info!(collection = %collection, conditions = filter.must.len(), "deleted by filter");
        Ok(())
    }

    /// Drop and re-provision one collection.
    pub async fn clear(&self, modality: Modality) -> Result<(), VectorStoreError> {
        self.ensure_ready()?;
        let collection = self.collection_name(modality);
        match self.backend.delete_collection(&collection).await {
            Ok(()) | Err(VectorStoreError::CollectionNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.create(&collection).await?;
        info!(collection = %collection, "cleared collection");
        Ok(())
    }
}
