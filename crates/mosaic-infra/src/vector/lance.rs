//! Embedded LanceDB backend.
//!
//! Implements `VectorBackend` with one LanceDB table per collection under a
//! local directory. Tables use the layout from [`super::schema`]. Upserts
//! delete the incoming ids before appending, so re-indexing replaces rows.
//!
//! Filters on promoted columns (`document_id`, `content_type`) are pushed
//! down as SQL predicates; every other condition is evaluated in-process
//! against the decoded payload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use mosaic_core::vector::backend::VectorBackend;
use mosaic_types::error::VectorStoreError;
use mosaic_types::vector::{
    CollectionSpec, DistanceMetric, FieldCondition, PayloadFilter, QueryOptions, RecordPayload,
    ScoredPoint, VectorRecord,
};
use serde_json::Value;
use uuid::Uuid;

use super::schema::{
    COL_CONTENT_TYPE, COL_DOCUMENT_ID, COL_ID, COL_PAYLOAD, PROMOTED_COLUMNS, collection_schema,
    schema_dimension, vector_item_field,
};

/// Over-fetch factor for searches whose filter needs in-process evaluation.
const RESIDUAL_FILTER_FETCH_FACTOR: usize = 4;

/// LanceDB-backed implementation of `VectorBackend`.
pub struct LanceBackend {
    db: lancedb::Connection,
    base_path: PathBuf,
    distance: DistanceMetric,
}

impl LanceBackend {
    /// Open or create a LanceDB database at `base_path`.
    ///
    /// `distance` is used for every search; LanceDB tables do not record it.
    pub async fn open(base_path: PathBuf, distance: DistanceMetric) -> Result<Self, VectorStoreError> {
        tokio::fs::create_dir_all(&base_path)
            .await
            .map_err(|e| VectorStoreError::Unreachable(format!("{}: {e}", base_path.display())))?;

        let uri = base_path.to_str().ok_or_else(|| {
            VectorStoreError::Backend(format!("path contains invalid UTF-8: {}", base_path.display()))
        })?;

        let db = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| VectorStoreError::Unreachable(e.to_string()))?;

        Ok(Self {
            db,
            base_path,
            distance,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn open_table(&self, name: &str) -> Result<lancedb::Table, VectorStoreError> {
        match self.db.open_table(name).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => Err(VectorStoreError::CollectionNotFound(name.to_string())),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn table_dimension(&self, table: &lancedb::Table) -> Result<i32, VectorStoreError> {
        let schema = table.schema().await.map_err(backend_error)?;
        schema_dimension(&schema)
            .ok_or_else(|| VectorStoreError::Backend(format!("table '{}' has no vector column", table.name())))
    }

    /// Decode every row matching the promoted part of `filter`.
    async fn scan(&self, table: &lancedb::Table, filter: &PayloadFilter) -> Result<Vec<RecordBatch>, VectorStoreError> {
        let total = table.count_rows(None).await.map_err(backend_error)?;
        if total == 0 {
            return Ok(Vec::new());
        }
        // Plain queries carry a default row limit; lift it to the table size.
        let mut query = table.query().limit(total);
        if let Some(predicate) = pushdown_predicate(filter) {
            query = query.only_if(predicate);
        }
        query
            .execute()
            .await
            .map_err(backend_error)?
            .try_collect()
            .await
            .map_err(backend_error)
    }
}

fn backend_error(e: lancedb::Error) -> VectorStoreError {
    VectorStoreError::Backend(e.to_string())
}

fn distance_type(distance: DistanceMetric) -> lancedb::DistanceType {
    match distance {
        DistanceMetric::Cosine => lancedb::DistanceType::Cosine,
        DistanceMetric::Dot => lancedb::DistanceType::Dot,
        DistanceMetric::Euclid => lancedb::DistanceType::L2,
    }
}

/// Convert LanceDB's `_distance` into a higher-is-better score.
///
/// Cosine and dot distances are `1 - similarity`. L2 distances map into
/// `(0, 1]`.
fn distance_to_score(distance: DistanceMetric, d: f32) -> f32 {
    match distance {
        DistanceMetric::Cosine | DistanceMetric::Dot => 1.0 - d,
        DistanceMetric::Euclid => 1.0 / (1.0 + d.max(0.0)),
    }
}

fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn is_pushdown(cond: &FieldCondition) -> bool {
    PROMOTED_COLUMNS.contains(&cond.key.as_str()) && cond.value.is_string()
}

/// SQL predicate for the conditions on promoted columns, if any.
fn pushdown_predicate(filter: &PayloadFilter) -> Option<String> {
    let clauses: Vec<String> = filter
        .must
        .iter()
        .filter(|c| is_pushdown(c))
        .filter_map(|c| c.value.as_str().map(|v| format!("{} = {}", c.key, sql_quote(v))))
        .collect();
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn has_residual(filter: &PayloadFilter) -> bool {
    filter.must.iter().any(|c| !is_pushdown(c))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, VectorStoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| VectorStoreError::Backend(format!("missing or mistyped column '{name}'")))
}

/// Decode `(id, payload)` rows from a batch.
fn decode_rows(batch: &RecordBatch) -> Result<Vec<(Uuid, RecordPayload)>, VectorStoreError> {
    let ids = string_column(batch, COL_ID)?;
    let payloads = string_column(batch, COL_PAYLOAD)?;

    (0..batch.num_rows())
        .map(|i| {
            let id = Uuid::parse_str(ids.value(i))
                .map_err(|e| VectorStoreError::InvalidRecord(format!("invalid id '{}': {e}", ids.value(i))))?;
            let payload: RecordPayload = serde_json::from_str(payloads.value(i))
                .map_err(|e| VectorStoreError::InvalidRecord(format!("record {id}: {e}")))?;
            Ok((id, payload))
        })
        .collect()
}

fn records_to_batch(records: &[VectorRecord], dimension: i32) -> Result<RecordBatch, VectorStoreError> {
    let dim = dimension as usize;
    if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
        return Err(VectorStoreError::InvalidRecord(format!(
            "record {} has {} dimensions, collection expects {dim}",
            bad.id,
            bad.vector.len()
        )));
    }

    let mut payloads = Vec::with_capacity(records.len());
    for record in records {
        let json = serde_json::to_string(&record.payload)
            .map_err(|e| VectorStoreError::InvalidRecord(format!("record {}: {e}", record.id)))?;
        payloads.push(json);
    }

    let id_array = StringArray::from(records.iter().map(|r| r.id.to_string()).collect::<Vec<_>>());
    let doc_array = StringArray::from(
        records
            .iter()
            .map(|r| r.payload.document_id.to_string())
            .collect::<Vec<_>>(),
    );
    let type_array = StringArray::from(
        records
            .iter()
            .map(|r| r.payload.content_type.to_string())
            .collect::<Vec<_>>(),
    );
    let payload_array = StringArray::from(payloads);

    let values = Float32Array::from(records.iter().flat_map(|r| r.vector.iter().copied()).collect::<Vec<f32>>());
    let vector_array = FixedSizeListArray::try_new(vector_item_field(), dimension, Arc::new(values), None)
        .map_err(|e| VectorStoreError::InvalidRecord(format!("failed to build vector column: {e}")))?;

    RecordBatch::try_new(
        Arc::new(collection_schema(dimension)),
        vec![
            Arc::new(id_array),
            Arc::new(doc_array),
            Arc::new(type_array),
            Arc::new(payload_array),
            Arc::new(vector_array),
        ],
    )
    .map_err(|e| VectorStoreError::InvalidRecord(format!("failed to build record batch: {e}")))
}

fn id_list_predicate(ids: &[Uuid]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| sql_quote(&id.to_string())).collect();
    format!("{COL_ID} IN ({})", quoted.join(", "))
}

// ---------------------------------------------------------------------------
// VectorBackend implementation
// ---------------------------------------------------------------------------

impl VectorBackend for LanceBackend {
    async fn health(&self) -> Result<(), VectorStoreError> {
        self.db
            .table_names()
            .execute()
            .await
            .map(|_| ())
            .map_err(|e| VectorStoreError::Unreachable(e.to_string()))
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        self.db.table_names().execute().await.map_err(backend_error)
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), VectorStoreError> {
        if self.list_collections().await?.iter().any(|n| n == &spec.name) {
            return Err(VectorStoreError::AlreadyExists(spec.name.clone()));
        }
        let dimension = i32::try_from(spec.dimension)
            .map_err(|_| VectorStoreError::InvalidRecord(format!("dimension {} too large", spec.dimension)))?;

        match self
            .db
            .create_empty_table(&spec.name, Arc::new(collection_schema(dimension)))
            .execute()
            .await
        {
            Ok(_) => {
                tracing::info!(collection = %spec.name, dimension, "created LanceDB table");
                Ok(())
            }
            Err(lancedb::Error::TableAlreadyExists { .. }) => Err(VectorStoreError::AlreadyExists(spec.name.clone())),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        match self.db.drop_table(name, &[]).await {
            Ok(()) => Ok(()),
            Err(lancedb::Error::TableNotFound { .. }) => Err(VectorStoreError::CollectionNotFound(name.to_string())),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let table = self.open_table(collection).await?;
        let dimension = self.table_dimension(&table).await?;
        let batch = records_to_batch(records, dimension)?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        table.delete(&id_list_predicate(&ids)).await.map_err(backend_error)?;

        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table.add(reader).execute().await.map_err(backend_error)?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        if options.limit == 0 {
            return Ok(Vec::new());
        }
        let table = self.open_table(collection).await?;
        let filter = options.filter.clone().unwrap_or_default();
        let fetch = if has_residual(&filter) {
            options.limit.saturating_mul(RESIDUAL_FILTER_FETCH_FACTOR)
        } else {
            options.limit
        };

        let mut query = table
            .vector_search(vector)
            .map_err(backend_error)?
            .distance_type(distance_type(self.distance))
            .limit(fetch);
        if let Some(predicate) = pushdown_predicate(&filter) {
            query = query.only_if(predicate);
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(backend_error)?
            .try_collect()
            .await
            .map_err(backend_error)?;

        let mut points = Vec::new();
        for batch in &batches {
            if batch.num_rows() == 0 {
                continue;
            }
            // The _distance column is added by LanceDB vector search
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            for (i, (id, payload)) in decode_rows(batch)?.into_iter().enumerate() {
                if !filter.matches(&payload) {
                    continue;
                }
                let d = distances.map_or(0.0, |col| col.value(i));
                let score = distance_to_score(self.distance, d);
                if options.threshold.is_some_and(|t| score < t) {
                    continue;
                }
                points.push(ScoredPoint { id, score, payload });
            }
        }

        points.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        points.truncate(options.limit);
        Ok(points)
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError> {
        let table = self.open_table(collection).await?;
        let rows = table.count_rows(None).await.map_err(backend_error)?;
        Ok(rows as u64)
    }

    async fn delete_by_filter(&self, collection: &str, filter: &PayloadFilter) -> Result<(), VectorStoreError> {
        let table = self.open_table(collection).await?;

        if !has_residual(filter) {
            let predicate = pushdown_predicate(filter).unwrap_or_else(|| "true".to_string());
            table.delete(&predicate).await.map_err(backend_error)?;
            return Ok(());
        }

        let mut ids = Vec::new();
        for batch in self.scan(&table, filter).await? {
            for (id, payload) in decode_rows(&batch)? {
                if filter.matches(&payload) {
                    ids.push(id);
                }
            }
        }
        if !ids.is_empty() {
            table.delete(&id_list_predicate(&ids)).await.map_err(backend_error)?;
        }
        tracing::debug!(collection, deleted = ids.len(), "deleted records by payload filter");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mosaic_types::modality::Modality;

    const DIM: usize = 4;

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i % DIM] = 1.0;
        v
    }

    fn record(vector: Vec<f32>, doc: Uuid, chunk: usize) -> VectorRecord {
        VectorRecord {
            id: Uuid::now_v7(),
            vector,
            payload: RecordPayload {
                document_id: doc,
                file_path: "/docs/a.md".to_string(),
                content_type: Modality::Text,
                chunk_index: Some(chunk),
                page_number: Some(1),
                created_at: Utc::now(),
                document_title: "A".to_string(),
                content: Some(format!("chunk {chunk}")),
                start_offset: None,
                end_offset: None,
                image_format: None,
                width: None,
                height: None,
                caption: None,
                extensions: serde_json::Map::new(),
            },
        }
    }

    fn spec(name: &str) -> CollectionSpec {
        CollectionSpec {
            name: name.to_string(),
            dimension: DIM,
            distance: DistanceMetric::Cosine,
        }
    }

    async fn backend() -> (LanceBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let backend = LanceBackend::open(dir.path().join("vectors"), DistanceMetric::Cosine)
            .await
            .expect("Failed to open LanceDB");
        (backend, dir)
    }

    #[test]
    fn test_pushdown_only_covers_promoted_string_conditions() {
        let doc = Uuid::nil();
        let filter = PayloadFilter::for_document(&doc).with("chunk_index", 2);
        assert_eq!(
            pushdown_predicate(&filter),
            Some(format!("document_id = '{doc}'"))
        );
        assert!(has_residual(&filter));
        assert!(!has_residual(&PayloadFilter::for_document(&doc)));
        assert_eq!(sql_quote("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_scores_are_higher_is_better() {
        assert!((distance_to_score(DistanceMetric::Cosine, 0.0) - 1.0).abs() < f32::EPSILON);
        assert!(distance_to_score(DistanceMetric::Cosine, 0.2) > distance_to_score(DistanceMetric::Cosine, 0.8));
        assert!(distance_to_score(DistanceMetric::Euclid, 0.5) > distance_to_score(DistanceMetric::Euclid, 3.0));
    }

    #[test]
    fn test_batch_rejects_wrong_dimension() {
        let err = records_to_batch(&[record(vec![1.0; 3], Uuid::nil(), 0)], DIM as i32).unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_create_list_and_duplicate_create() {
        let (backend, _dir) = backend().await;
        backend.health().await.unwrap();
        backend.create_collection(&spec("mosaic_text_chunks")).await.unwrap();

        let names = backend.list_collections().await.unwrap();
        assert_eq!(names, vec!["mosaic_text_chunks".to_string()]);

        let err = backend.create_collection(&spec("mosaic_text_chunks")).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_upsert_search_and_replace_by_id() {
        let (backend, _dir) = backend().await;
        backend.create_collection(&spec("c")).await.unwrap();
        let doc = Uuid::now_v7();

        let mut near = record(axis(0), doc, 0);
        let far = record(axis(1), doc, 1);
        backend.upsert("c", &[near.clone(), far.clone()]).await.unwrap();
        assert_eq!(backend.count("c").await.unwrap(), 2);

        let hits = backend.search("c", &axis(0), &QueryOptions::default()).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, near.id);
        assert!((hits[0].score - 1.0).abs() < 1e-4);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].payload.content.as_deref(), Some("chunk 0"));

        // Same id, new vector: row is replaced, not duplicated.
        near.vector = axis(2);
        backend.upsert("c", std::slice::from_ref(&near)).await.unwrap();
        assert_eq!(backend.count("c").await.unwrap(), 2);
        let hits = backend.search("c", &axis(2), &QueryOptions::default()).await.unwrap();
        assert_eq!(hits[0].id, near.id);
    }

    #[tokio::test]
    async fn test_search_applies_threshold_and_filters() {
        let (backend, _dir) = backend().await;
        backend.create_collection(&spec("c")).await.unwrap();
        let doc_a = Uuid::now_v7();
        let doc_b = Uuid::now_v7();
        backend
            .upsert(
                "c",
                &[
                    record(axis(0), doc_a, 0),
                    record(axis(1), doc_a, 1),
                    record(axis(0), doc_b, 0),
                ],
            )
            .await
            .unwrap();

        let options = QueryOptions {
            threshold: Some(0.5),
            ..Default::default()
        };
        let hits = backend.search("c", &axis(0), &options).await.unwrap();
        assert_eq!(hits.len(), 2);

        let options = QueryOptions {
            filter: Some(PayloadFilter::for_document(&doc_a)),
            ..Default::default()
        };
        let hits = backend.search("c", &axis(0), &options).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.payload.document_id == doc_a));

        let options = QueryOptions {
            filter: Some(PayloadFilter::for_document(&doc_a).with("chunk_index", 1)),
            ..Default::default()
        };
        let hits = backend.search("c", &axis(0), &options).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.chunk_index, Some(1));
    }

    #[tokio::test]
    async fn test_delete_by_filter_pushdown_and_residual() {
        let (backend, _dir) = backend().await;
        backend.create_collection(&spec("c")).await.unwrap();
        let doc_a = Uuid::now_v7();
        let doc_b = Uuid::now_v7();
        backend
            .upsert(
                "c",
                &[
                    record(axis(0), doc_a, 0),
                    record(axis(1), doc_a, 1),
                    record(axis(2), doc_b, 0),
                ],
            )
            .await
            .unwrap();

        backend
            .delete_by_filter("c", &PayloadFilter::for_document(&doc_a).with("chunk_index", 1))
            .await
            .unwrap();
        assert_eq!(backend.count("c").await.unwrap(), 2);

        backend
            .delete_by_filter("c", &PayloadFilter::for_document(&doc_a))
            .await
            .unwrap();
        assert_eq!(backend.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_collection_is_reported() {
        let (backend, _dir) = backend().await;
        let err = backend.count("absent").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));

        backend.create_collection(&spec("c")).await.unwrap();
        backend.delete_collection("c").await.unwrap();
        assert!(backend.list_collections().await.unwrap().is_empty());
    }
}
