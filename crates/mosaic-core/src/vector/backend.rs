//! Vector backend trait.
//!
//! Defines the raw collection/point operations of a vector database.
//! Implementations (Qdrant over REST, embedded LanceDB) live in mosaic-infra.

use mosaic_types::error::VectorStoreError;
use mosaic_types::vector::{CollectionSpec, PayloadFilter, QueryOptions, ScoredPoint, VectorRecord};

/// Port for a vector database holding named collections.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait VectorBackend: Send + Sync {
    /// Verify the backing service is reachable.
    fn health(&self) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    fn list_collections(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, VectorStoreError>> + Send;

    /// Create a collection.
    ///
    /// Returns `VectorStoreError::AlreadyExists` when the name is taken.
    fn create_collection(
        &self,
        spec: &CollectionSpec,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    fn delete_collection(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Insert or replace records by id.
    fn upsert(
        &self,
        collection: &str,
        records: &[VectorRecord],
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;

    /// Nearest-neighbour search. Backends should honour `options` but the
    /// caller does not rely on it.
    fn search(
        &self,
        collection: &str,
        vector: &[f32],
        options: &QueryOptions,
    ) -> impl std::future::Future<Output = Result<Vec<ScoredPoint>, VectorStoreError>> + Send;

    /// Exact point count.
    fn count(
        &self,
        collection: &str,
    ) -> impl std::future::Future<Output = Result<u64, VectorStoreError>> + Send;

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: &PayloadFilter,
    ) -> impl std::future::Future<Output = Result<(), VectorStoreError>> + Send;
}
