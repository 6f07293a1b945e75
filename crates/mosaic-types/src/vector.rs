//! Vector records, payloads, filters and search hits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::document::ImageFormat;
use crate::modality::Modality;

/// Derive a stable record id for the `index`-th item of a document.
///
/// SHA-256 over the document id, the modality and the item index, truncated
/// to 16 bytes. Re-indexing an unchanged file upserts the same ids.
pub fn record_id(document_id: &Uuid, modality: Modality, index: usize) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(modality.to_string().as_bytes());
    hasher.update(index.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Similarity metric a collection is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Dot => write!(f, "dot"),
            DistanceMetric::Euclid => write!(f, "euclid"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" => Ok(DistanceMetric::Dot),
            "euclid" | "euclidean" => Ok(DistanceMetric::Euclid),
            other => Err(format!("invalid distance metric: '{other}'")),
        }
    }
}

/// Parameters for provisioning one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub distance: DistanceMetric,
}

/// Metadata stored next to every vector.
///
/// Text-only and image-only fields are optional. Unknown keys survive a
/// round trip through `extensions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub document_id: Uuid,
    pub file_path: String,
    pub content_type: Modality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub document_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_format: Option<ImageFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl RecordPayload {
    /// Look up a payload field by its serialized key.
    pub fn field(&self, key: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.get(key).cloned(),
            _ => None,
        }
    }
}

/// A persisted unit: id, embedding and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

/// Equality condition on a single payload key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub key: String,
    pub value: Value,
}

/// Conjunction of equality conditions over payload fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadFilter {
    pub must: Vec<FieldCondition>,
}

impl PayloadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching every record of one document.
    pub fn for_document(document_id: &Uuid) -> Self {
        Self::new().with("document_id", Value::String(document_id.to_string()))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.push(FieldCondition {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// Evaluate the filter against a payload in-process.
    pub fn matches(&self, payload: &RecordPayload) -> bool {
        if self.must.is_empty() {
            return true;
        }
        let Ok(Value::Object(map)) = serde_json::to_value(payload) else {
            return false;
        };
        self.must
            .iter()
            .all(|cond| map.get(&cond.key).is_some_and(|v| v == &cond.value))
    }
}

/// Raw backend search result, before the modality is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: RecordPayload,
}

/// A ranked match from one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: RecordPayload,
    pub modality: Modality,
}

/// Options for a single collection query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub limit: usize,
    /// Minimum score; hits below it are dropped.
    pub threshold: Option<f32>,
    pub filter: Option<PayloadFilter>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: None,
            filter: None,
        }
    }
}

/// Point count for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub modality: Modality,
    pub points_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> RecordPayload {
        RecordPayload {
            document_id: Uuid::nil(),
            file_path: "/docs/a.md".to_string(),
            content_type: Modality::Text,
            chunk_index: Some(3),
            page_number: Some(2),
            created_at: Utc::now(),
            document_title: "A".to_string(),
            content: Some("hello".to_string()),
            start_offset: Some(0),
            end_offset: Some(5),
            image_format: None,
            width: None,
            height: None,
            caption: None,
            extensions: Map::new(),
        }
    }

    #[test]
    fn test_record_id_is_deterministic_and_modality_scoped() {
        let doc = Uuid::now_v7();
        assert_eq!(
            record_id(&doc, Modality::Text, 0),
            record_id(&doc, Modality::Text, 0)
        );
        assert_ne!(
            record_id(&doc, Modality::Text, 0),
            record_id(&doc, Modality::Image, 0)
        );
        assert_ne!(
            record_id(&doc, Modality::Text, 0),
            record_id(&doc, Modality::Text, 1)
        );
    }

    #[test]
    fn test_filter_matches_payload() {
        let p = payload();
        assert!(PayloadFilter::new().matches(&p));
        assert!(PayloadFilter::for_document(&Uuid::nil()).matches(&p));
        assert!(
            PayloadFilter::new()
                .with("content_type", "text")
                .with("chunk_index", 3)
                .matches(&p)
        );
        assert!(!PayloadFilter::new().with("content_type", "image").matches(&p));
        assert!(!PayloadFilter::new().with("caption", "x").matches(&p));
    }

    #[test]
    fn test_payload_omits_absent_fields_and_keeps_extensions() {
        let mut p = payload();
        p.extensions
            .insert("source".to_string(), Value::String("upload".to_string()));
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("image_format").is_none());
        assert_eq!(json["source"], "upload");

        let back: RecordPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.extensions.get("source"), Some(&Value::from("upload")));
        assert_eq!(back.chunk_index, Some(3));
    }

    #[test]
    fn test_distance_metric_parse() {
        assert_eq!(
            "Euclidean".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Euclid
        );
        assert_eq!(DistanceMetric::default(), DistanceMetric::Cosine);
    }
}
