//! Retrieval service: single-modality, cross-modal and multimodal search.
//!
//! Every query embeds its input exactly once. Multimodal queries then hit
//! both collections concurrently, boost, merge and rank.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use mosaic_types::error::RetrievalError;
use mosaic_types::modality::Modality;
use mosaic_types::retrieval::{
    BoostFactors, MultimodalSearchOptions, RetrievalStats, RetrievedItem, SearchOptions,
};
use mosaic_types::vector::{QueryOptions, SearchHit};
use tracing::{Instrument, debug, info_span, warn};

use super::ranking::{apply_boost, merge_ranked, modality_counts};
use super::stats::QueryStats;
use crate::embedding::backend::EmbeddingBackend;
use crate::embedding::provider::EmbeddingProvider;
use crate::vector::backend::VectorBackend;
use crate::vector::store::VectorStore;

pub struct RetrievalService<E: EmbeddingBackend, V: VectorBackend> {
    embeddings: Arc<EmbeddingProvider<E>>,
    vectors: Arc<VectorStore<V>>,
    boosts: BoostFactors,
    stats: Mutex<QueryStats>,
}

impl<E: EmbeddingBackend, V: VectorBackend> RetrievalService<E, V> {
    pub fn new(embeddings: Arc<EmbeddingProvider<E>>, vectors: Arc<VectorStore<V>>, boosts: BoostFactors) -> Self {
        Self {
            embeddings,
            vectors,
            boosts,
            stats: Mutex::new(QueryStats::default()),
        }
    }

    /// Check both dependencies are ready. Does not initialize them.
    pub fn initialize(&self) -> Result<(), RetrievalError> {
        if !self.embeddings.is_ready() {
            return Err(RetrievalError::NotReady("embedding provider is not initialized".into()));
        }
        if !self.vectors.is_ready() {
            return Err(RetrievalError::NotReady("vector store is not initialized".into()));
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.embeddings.is_ready() && self.vectors.is_ready()
    }

    pub fn boosts(&self) -> BoostFactors {
        self.boosts
    }

    /// Text query against the text collection.
    pub async fn search_text(&self, query: &str, options: &SearchOptions) -> Result<Vec<RetrievedItem>, RetrievalError> {
        self.search_single(query, Modality::Text, options)
            .instrument(info_span!("search_text", limit = options.limit))
            .await
    }

    /// Text query against the image collection (cross-modal).
    pub async fn search_images(&self, query: &str, options: &SearchOptions) -> Result<Vec<RetrievedItem>, RetrievalError> {
        self.search_single(query, Modality::Image, options)
            .instrument(info_span!("search_images", limit = options.limit))
            .await
    }

    async fn search_single(
        &self,
        query: &str,
        modality: Modality,
        options: &SearchOptions,
    ) -> Result<Vec<RetrievedItem>, RetrievalError> {
        let start = Instant::now();
        validate_query(query)?;
        self.initialize()?;

        let vector = self.embeddings.embed_text(query).await?;
        let query_options = QueryOptions {
            limit: options.limit,
            threshold: options.threshold,
            filter: options.filter.clone(),
        };
        let hits = self.vectors.query(modality, &vector, &query_options).await?;

        self.record_query(start);
        debug!(%modality, hits = hits.len(), "search complete");
        Ok(hits.into_iter().map(RetrievedItem::from).collect())
    }

    /// Text query against both collections, merged and ranked.
    pub async fn search_multimodal(
        &self,
        query: &str,
        options: &MultimodalSearchOptions,
    ) -> Result<Vec<RetrievedItem>, RetrievalError> {
        self.multimodal_from_text(query, options)
            .instrument(info_span!("search_multimodal", limit = options.limit))
            .await
    }

    async fn multimodal_from_text(
        &self,
        query: &str,
        options: &MultimodalSearchOptions,
    ) -> Result<Vec<RetrievedItem>, RetrievalError> {
        let start = Instant::now();
        validate_query(query)?;
        self.initialize()?;

        let vector = self.embeddings.embed_text(query).await?;
        let hits = self.dual_query(&vector, options).await?;

        self.record_query(start);
        Ok(hits.into_iter().map(RetrievedItem::from).collect())
    }

    /// Image query against both collections, merged and ranked.
    pub async fn search_with_image(
        &self,
        image: &[u8],
        options: &MultimodalSearchOptions,
    ) -> Result<Vec<RetrievedItem>, RetrievalError> {
        self.multimodal_from_image(image, options)
            .instrument(info_span!("search_with_image", limit = options.limit, bytes = image.len()))
            .await
    }

    async fn multimodal_from_image(
        &self,
        image: &[u8],
        options: &MultimodalSearchOptions,
    ) -> Result<Vec<RetrievedItem>, RetrievalError> {
        let start = Instant::now();
        if image.is_empty() {
            return Err(RetrievalError::InvalidQuery("image is empty".into()));
        }
        self.initialize()?;

        let vector = self.embeddings.embed_image(image).await?;
        let hits = self.dual_query(&vector, options).await?;

        self.record_query(start);
        Ok(hits.into_iter().map(RetrievedItem::from).collect())
    }

    /// Query the enabled collections concurrently, each for `ceil(limit / 2)`
    /// hits, boost, then merge down to `limit`. Either query failing fails
    /// the whole search.
    async fn dual_query(&self, vector: &[f32], options: &MultimodalSearchOptions) -> Result<Vec<SearchHit>, RetrievalError> {
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let per_collection = QueryOptions {
            limit: options.limit.div_ceil(2),
            threshold: options.threshold,
            filter: options.filter.clone(),
        };

        let text_query = async {
            if options.include_text {
                self.vectors.query(Modality::Text, vector, &per_collection).await
            } else {
                Ok(Vec::new())
            }
        };
        let image_query = async {
            if options.include_images {
                self.vectors.query(Modality::Image, vector, &per_collection).await
            } else {
                Ok(Vec::new())
            }
        };
        let (text, images) = tokio::join!(text_query, image_query);
        let mut text = text?;
        let mut images = images?;

        if options.boost_text_results {
            apply_boost(&mut text, self.boosts.text);
        }
        if options.boost_image_results {
            apply_boost(&mut images, self.boosts.image);
        }

        let merged = merge_ranked(text, images, options.limit);
        let (text_hits, image_hits) = modality_counts(&merged);
        debug!(text_hits, image_hits, "merged multimodal results");
        Ok(merged)
    }

    fn record_query(&self, start: Instant) {
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.record(duration_ms, Utc::now());
    }

    /// Snapshot of running statistics. Collection sizes are refreshed best
    /// effort and left empty when the backend cannot be reached.
    pub async fn stats(&self) -> RetrievalStats {
        let snapshot = self
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let text_collection_size = match self.vectors.count(Modality::Text).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "could not refresh text collection size");
                None
            }
        };
        let image_collection_size = match self.vectors.count(Modality::Image).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "could not refresh image collection size");
                None
            }
        };

        RetrievalStats {
            total_queries: snapshot.total_queries,
            average_response_ms: snapshot.average_response_ms,
            last_query_at: snapshot.last_query_at,
            text_collection_size,
            image_collection_size,
        }
    }
}

fn validate_query(query: &str) -> Result<(), RetrievalError> {
    if query.trim().is_empty() {
        return Err(RetrievalError::InvalidQuery("query text is empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_types::vector::{DistanceMetric, PayloadFilter, VectorRecord};
    use uuid::Uuid;

    use crate::test_support::{DIM, MemoryVectorBackend, StubEmbedder, axis, hash_vector, record};
    use crate::vector::store::StoreSettings;

    struct Harness {
        service: RetrievalService<StubEmbedder, MemoryVectorBackend>,
        embedder: StubEmbedder,
        backend: MemoryVectorBackend,
    }

    async fn harness(embedder: StubEmbedder) -> Harness {
        let backend = MemoryVectorBackend::new();
        let embeddings = Arc::new(EmbeddingProvider::new(embedder.clone(), DIM));
        let vectors = Arc::new(VectorStore::new(
            backend.clone(),
            StoreSettings {
                collection_prefix: "r".to_string(),
                dimension: DIM,
                distance: DistanceMetric::Cosine,
                batch_size: 100,
            },
        ));
        embeddings.initialize().await.expect("Failed to init embeddings");
        vectors.initialize().await.expect("Failed to init vectors");
        Harness {
            service: RetrievalService::new(embeddings, vectors, BoostFactors::default()),
            embedder,
            backend,
        }
    }

    fn seed(backend: &MemoryVectorBackend, modality: Modality, records: Vec<VectorRecord>) {
        let name = match modality {
            Modality::Text => "r_text_chunks",
            Modality::Image => "r_image_embeddings",
        };
        backend.seed(name, records);
    }

    #[tokio::test]
    async fn test_search_text_on_empty_collection() {
        let h = harness(StubEmbedder::new()).await;
        let items = h
            .service
            .search_text("anything", &SearchOptions::default())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_query_before_dependencies_ready() {
        let embeddings = Arc::new(EmbeddingProvider::new(StubEmbedder::new(), DIM));
        let vectors = Arc::new(VectorStore::new(MemoryVectorBackend::new(), StoreSettings::default()));
        let service = RetrievalService::new(embeddings, vectors, BoostFactors::default());

        let err = service
            .search_text("hello", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NotReady(_)));
        assert!(!service.is_ready());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let h = harness(StubEmbedder::new()).await;
        let err = h
            .service
            .search_multimodal("  ", &MultimodalSearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidQuery(_)));
        assert_eq!(h.embedder.text_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_text_maps_hits() {
        let h = harness(StubEmbedder::new().with_vector("fox", axis(2))).await;
        let doc = Uuid::now_v7();
        seed(
            &h.backend,
            Modality::Text,
            vec![record(1, axis(2), doc, Modality::Text), record(2, axis(3), doc, Modality::Text)],
        );

        let options = SearchOptions {
            limit: 5,
            threshold: Some(0.5),
            filter: None,
        };
        let items = h.service.search_text("fox", &options).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].document_id, doc);
        assert_eq!(items[0].content.as_deref(), Some("chunk 1"));
        assert_eq!(items[0].modality, Modality::Text);
    }

    #[tokio::test]
    async fn test_search_images_is_cross_modal() {
        let h = harness(StubEmbedder::new().with_vector("a diagram", axis(1))).await;
        let doc = Uuid::now_v7();
        seed(&h.backend, Modality::Image, vec![record(7, axis(1), doc, Modality::Image)]);
        seed(&h.backend, Modality::Text, vec![record(8, axis(1), doc, Modality::Text)]);

        let items = h
            .service
            .search_images("a diagram", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].modality, Modality::Image);
        assert_eq!(h.embedder.text_calls(), 1);
    }

    #[tokio::test]
    async fn test_boosted_text_wins_ties() {
        let h = harness(StubEmbedder::new().with_vector("q", axis(0))).await;
        let doc = Uuid::now_v7();
        seed(&h.backend, Modality::Text, vec![record(200, axis(0), doc, Modality::Text)]);
        seed(&h.backend, Modality::Image, vec![record(1, axis(0), doc, Modality::Image)]);

        let options = MultimodalSearchOptions {
            boost_text_results: true,
            ..Default::default()
        };
        let items = h.service.search_multimodal("q", &options).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].modality, Modality::Text);
        // Boosted scores are not clamped.
        assert!(items[0].score > 1.0);
        assert!((items[1].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_image_boost_can_outrank_text() {
        let mut mixed = axis(0);
        mixed[1] = 0.3;
        let h = harness(StubEmbedder::new().with_vector("q", axis(0))).await;
        let doc = Uuid::now_v7();
        seed(&h.backend, Modality::Text, vec![record(1, axis(0), doc, Modality::Text)]);
        seed(&h.backend, Modality::Image, vec![record(2, mixed, doc, Modality::Image)]);

        let options = MultimodalSearchOptions {
            boost_image_results: true,
            ..Default::default()
        };
        let items = h.service.search_multimodal("q", &options).await.unwrap();
        assert_eq!(items[0].modality, Modality::Image);
    }

    #[tokio::test]
    async fn test_multimodal_requests_half_limit_per_collection() {
        let h = harness(StubEmbedder::new().with_vector("q", axis(0))).await;
        let doc = Uuid::now_v7();
        seed(
            &h.backend,
            Modality::Text,
            (1..=5).map(|i| record(i, axis(0), doc, Modality::Text)).collect(),
        );
        seed(
            &h.backend,
            Modality::Image,
            (11..=15).map(|i| record(i, axis(0), doc, Modality::Image)).collect(),
        );

        let options = MultimodalSearchOptions {
            limit: 3,
            ..Default::default()
        };
        let items = h.service.search_multimodal("q", &options).await.unwrap();
        assert_eq!(items.len(), 3);
        let text = items.iter().filter(|i| i.modality == Modality::Text).count();
        assert_eq!(text, 2);
    }

    #[tokio::test]
    async fn test_include_flags_restrict_collections() {
        let h = harness(StubEmbedder::new().with_vector("q", axis(0))).await;
        let doc = Uuid::now_v7();
        seed(&h.backend, Modality::Text, vec![record(1, axis(0), doc, Modality::Text)]);
        seed(&h.backend, Modality::Image, vec![record(2, axis(0), doc, Modality::Image)]);

        let options = MultimodalSearchOptions {
            include_text: false,
            ..Default::default()
        };
        let items = h.service.search_multimodal("q", &options).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].modality, Modality::Image);
    }

    #[tokio::test]
    async fn test_search_with_image_embeds_once() {
        let h = harness(StubEmbedder::new()).await;
        let image = b"\x89PNG\r\n\x1a\nimage-bytes".to_vec();
        let query_vec = hash_vector(&image);
        let doc = Uuid::now_v7();
        seed(
            &h.backend,
            Modality::Text,
            (1..=4).map(|i| record(i, axis(i as usize % DIM), doc, Modality::Text)).collect(),
        );
        seed(
            &h.backend,
            Modality::Image,
            vec![
                record(20, query_vec.clone(), doc, Modality::Image),
                record(21, axis(5), doc, Modality::Image),
                record(22, axis(6), doc, Modality::Image),
            ],
        );

        let options = MultimodalSearchOptions {
            limit: 4,
            ..Default::default()
        };
        let items = h.service.search_with_image(&image, &options).await.unwrap();

        assert_eq!(h.embedder.image_calls(), 1);
        assert_eq!(h.embedder.text_calls(), 0);
        assert!(items.len() <= 4);
        assert!(items.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(items[0].modality, Modality::Image);
        assert!((items[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_one_failing_collection_fails_multimodal() {
        let h = harness(StubEmbedder::new()).await;
        h.backend.fail_search_in("r_image_embeddings");
        let err = h
            .service
            .search_multimodal("q", &MultimodalSearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::VectorStore(_)));
    }

    #[tokio::test]
    async fn test_filter_is_forwarded() {
        let h = harness(StubEmbedder::new().with_vector("q", axis(0))).await;
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        seed(
            &h.backend,
            Modality::Text,
            vec![record(1, axis(0), a, Modality::Text), record(2, axis(0), b, Modality::Text)],
        );
        let options = MultimodalSearchOptions {
            filter: Some(PayloadFilter::for_document(&b)),
            ..Default::default()
        };
        let items = h.service.search_multimodal("q", &options).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].document_id, b);
    }

    #[tokio::test]
    async fn test_stats_track_queries_and_sizes() {
        let h = harness(StubEmbedder::new()).await;
        let doc = Uuid::now_v7();
        seed(&h.backend, Modality::Text, vec![record(1, axis(0), doc, Modality::Text)]);

        for _ in 0..3 {
            h.service
                .search_text("hello", &SearchOptions::default())
                .await
                .unwrap();
        }
        let stats = h.service.stats().await;
        assert_eq!(stats.total_queries, 3);
        assert!(stats.last_query_at.is_some());
        assert!(stats.average_response_ms >= 0.0);
        assert_eq!(stats.text_collection_size, Some(1));
        assert_eq!(stats.image_collection_size, Some(0));
    }
}
