//! Qdrant REST backend.
//!
//! Implements `VectorBackend` from `mosaic-core` over Qdrant's HTTP API.
//! Points are addressed by UUID; payloads are the serialized
//! `RecordPayload`. The API key, when configured, is sent as the `api-key`
//! header and never logged.

use std::time::Duration;

use mosaic_core::vector::backend::VectorBackend;
use mosaic_types::error::VectorStoreError;
use mosaic_types::vector::{
    CollectionSpec, DistanceMetric, PayloadFilter, QueryOptions, RecordPayload, ScoredPoint,
    VectorRecord,
};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Qdrant REST client.
pub struct QdrantBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl QdrantBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, VectorStoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VectorStoreError::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.api_key {
            Some(key) => builder.header("api-key", key.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and map transport and status failures.
    ///
    /// `collection` names the collection for 404 / 409 mapping.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        collection: Option<&str>,
    ) -> Result<reqwest::Response, VectorStoreError> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Err(map_status_error(status, &body, collection))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        collection: Option<&str>,
    ) -> Result<T, VectorStoreError> {
        let response = self.send(builder, collection).await?;
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| VectorStoreError::Backend(format!("failed to parse Qdrant response: {e}")))?;
        Ok(envelope.result)
    }
}

fn map_transport_error(err: reqwest::Error) -> VectorStoreError {
    if err.is_connect() || err.is_timeout() {
        VectorStoreError::Unreachable(err.to_string())
    } else {
        VectorStoreError::Backend(err.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str, collection: Option<&str>) -> VectorStoreError {
    match (status, collection) {
        (StatusCode::NOT_FOUND, Some(name)) => VectorStoreError::CollectionNotFound(name.to_string()),
        (StatusCode::CONFLICT, Some(name)) => VectorStoreError::AlreadyExists(name.to_string()),
        // Some Qdrant versions answer a duplicate create with 400.
        (StatusCode::BAD_REQUEST, Some(name)) if body.contains("already exists") => {
            VectorStoreError::AlreadyExists(name.to_string())
        }
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            VectorStoreError::Unreachable(format!("Qdrant rejected credentials ({status})"))
        }
        _ => VectorStoreError::Backend(format!("Qdrant request failed ({status}): {body}")),
    }
}

fn distance_name(distance: DistanceMetric) -> &'static str {
    match distance {
        DistanceMetric::Cosine => "Cosine",
        DistanceMetric::Dot => "Dot",
        DistanceMetric::Euclid => "Euclid",
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    points: Vec<PointStruct<'a>>,
}

#[derive(Debug, Serialize)]
struct PointStruct<'a> {
    id: Uuid,
    vector: &'a [f32],
    payload: &'a RecordPayload,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<QdrantFilter>,
}

#[derive(Debug, Deserialize)]
struct ScoredPointResult {
    id: PointId,
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

/// Qdrant ids are either unsigned integers or UUID strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointId {
    Uuid(Uuid),
    Num(u64),
}

#[derive(Debug, Serialize)]
struct CountRequest {
    exact: bool,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Debug, Serialize)]
struct DeleteByFilterRequest {
    filter: QdrantFilter,
}

#[derive(Debug, Serialize, PartialEq)]
struct QdrantFilter {
    must: Vec<QdrantCondition>,
}

#[derive(Debug, Serialize, PartialEq)]
struct QdrantCondition {
    key: String,
    #[serde(rename = "match")]
    matches: MatchValue,
}

#[derive(Debug, Serialize, PartialEq)]
struct MatchValue {
    value: serde_json::Value,
}

impl From<&PayloadFilter> for QdrantFilter {
    fn from(filter: &PayloadFilter) -> Self {
        Self {
            must: filter
                .must
                .iter()
                .map(|cond| QdrantCondition {
                    key: cond.key.clone(),
                    matches: MatchValue {
                        value: cond.value.clone(),
                    },
                })
                .collect(),
        }
    }
}

impl ScoredPointResult {
    fn into_scored_point(self) -> Result<ScoredPoint, VectorStoreError> {
        let id = match self.id {
            PointId::Uuid(id) => id,
            PointId::Num(n) => {
                return Err(VectorStoreError::InvalidRecord(format!("unexpected numeric point id {n}")));
            }
        };
        let payload = self
            .payload
            .ok_or_else(|| VectorStoreError::InvalidRecord(format!("point {id} has no payload")))?;
        let payload: RecordPayload = serde_json::from_value(payload)
            .map_err(|e| VectorStoreError::InvalidRecord(format!("point {id}: {e}")))?;
        Ok(ScoredPoint {
            id,
            score: self.score,
            payload,
        })
    }
}

// ---------------------------------------------------------------------------
// VectorBackend implementation
// ---------------------------------------------------------------------------

impl VectorBackend for QdrantBackend {
    async fn health(&self) -> Result<(), VectorStoreError> {
        self.send(self.request(reqwest::Method::GET, "/healthz"), None)
            .await
            .map(|_| ())
    }

    async fn list_collections(&self) -> Result<Vec<String>, VectorStoreError> {
        let result: CollectionsResult = self
            .send_json(self.request(reqwest::Method::GET, "/collections"), None)
            .await?;
        Ok(result.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), VectorStoreError> {
        let body = CreateCollectionRequest {
            vectors: VectorParams {
                size: spec.dimension,
                distance: distance_name(spec.distance),
            },
        };
        let builder = self
            .request(reqwest::Method::PUT, &format!("/collections/{}", spec.name))
            .json(&body);
        self.send(builder, Some(&spec.name)).await?;
        tracing::info!(collection = %spec.name, dimension = spec.dimension, distance = %spec.distance, "created Qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        let builder = self.request(reqwest::Method::DELETE, &format!("/collections/{name}"));
        self.send(builder, Some(name)).await.map(|_| ())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let body = UpsertRequest {
            points: records
                .iter()
                .map(|r| PointStruct {
                    id: r.id,
                    vector: &r.vector,
                    payload: &r.payload,
                })
                .collect(),
        };
        let builder = self
            .request(reqwest::Method::PUT, &format!("/collections/{collection}/points?wait=true"))
            .json(&body);
        self.send(builder, Some(collection)).await.map(|_| ())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let body = SearchRequest {
            vector,
            limit: options.limit,
            with_payload: true,
            score_threshold: options.threshold,
            filter: options
                .filter
                .as_ref()
                .filter(|f| !f.is_empty())
                .map(QdrantFilter::from),
        };
        let builder = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/search"))
            .json(&body);
        let points: Vec<ScoredPointResult> = self.send_json(builder, Some(collection)).await?;
        points.into_iter().map(ScoredPointResult::into_scored_point).collect()
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorStoreError> {
        let builder = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/count"))
            .json(&CountRequest { exact: true });
        let result: CountResult = self.send_json(builder, Some(collection)).await?;
        Ok(result.count)
    }

    async fn delete_by_filter(&self, collection: &str, filter: &PayloadFilter) -> Result<(), VectorStoreError> {
        let body = DeleteByFilterRequest {
            filter: QdrantFilter::from(filter),
        };
        let builder = self
            .request(reqwest::Method::POST, &format!("/collections/{collection}/points/delete?wait=true"))
            .json(&body);
        self.send(builder, Some(collection)).await.map(|_| ())
    }
}
