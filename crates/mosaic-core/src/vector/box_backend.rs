//! BoxVectorBackend -- object-safe dynamic dispatch wrapper for VectorBackend.
//!
//! Same blanket-impl pattern as `BoxEmbeddingBackend`.

use std::future::Future;
use std::pin::Pin;

use mosaic_types::error::VectorStoreError;
use mosaic_types::vector::{CollectionSpec, PayloadFilter, QueryOptions, ScoredPoint, VectorRecord};

use super::backend::VectorBackend;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`VectorBackend`] with boxed futures.
pub trait VectorBackendDyn: Send + Sync {
    fn health_boxed(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn list_collections_boxed(&self) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>>;

    fn create_collection_boxed<'a>(
        &'a self,
        spec: &'a CollectionSpec,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    fn delete_collection_boxed<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    fn upsert_boxed<'a>(
        &'a self,
        collection: &'a str,
        records: &'a [VectorRecord],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;

    fn search_boxed<'a>(
        &'a self,
        collection: &'a str,
        vector: &'a [f32],
        options: &'a QueryOptions,
    ) -> BoxFuture<'a, Result<Vec<ScoredPoint>, VectorStoreError>>;

    fn count_boxed<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<u64, VectorStoreError>>;

    fn delete_by_filter_boxed<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a PayloadFilter,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>>;
}

impl<T: VectorBackend> VectorBackendDyn for T {
    fn health_boxed(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(self.health())
    }

    fn list_collections_boxed(&self) -> BoxFuture<'_, Result<Vec<String>, VectorStoreError>> {
        Box::pin(self.list_collections())
    }

    fn create_collection_boxed<'a>(
        &'a self,
        spec: &'a CollectionSpec,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(self.create_collection(spec))
    }

    fn delete_collection_boxed<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(self.delete_collection(name))
    }

    fn upsert_boxed<'a>(
        &'a self,
        collection: &'a str,
        records: &'a [VectorRecord],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(self.upsert(collection, records))
    }

    fn search_boxed<'a>(
        &'a self,
        collection: &'a str,
        vector: &'a [f32],
        options: &'a QueryOptions,
    ) -> BoxFuture<'a, Result<Vec<ScoredPoint>, VectorStoreError>> {
        Box::pin(self.search(collection, vector, options))
    }

    fn count_boxed<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<u64, VectorStoreError>> {
        Box::pin(self.count(collection))
    }

    fn delete_by_filter_boxed<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a PayloadFilter,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(self.delete_by_filter(collection, filter))
    }
}

/// Type-erased vector backend, selected at runtime from config.
pub struct BoxVectorBackend {
    inner: Box<dyn VectorBackendDyn>,
}

impl BoxVectorBackend {
    pub fn new<T: VectorBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }
}

impl VectorBackend for BoxVectorBackend {
    async fn health(&self) -> Result<(), VectorStoreError> {
        self.inner.health_boxed().await
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        self.inner.list_collections_boxed().await
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), VectorStoreError> {
        self.inner.create_collection_boxed(spec).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        self.inner.delete_collection_boxed(name).await
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        self.inner.upsert_boxed(collection, records).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        self.inner.search_boxed(collection, vector, options).await
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError> {
        self.inner.count_boxed(collection).await
    }

    async fn delete_by_filter(&self, collection: &str, filter: &PayloadFilter) -> Result<(), VectorStoreError> {
        self.inner.delete_by_filter_boxed(collection, filter).await
    }
}
