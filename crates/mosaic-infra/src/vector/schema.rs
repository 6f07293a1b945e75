//! Arrow schema for LanceDB collection tables.
//!
//! Every collection uses the same layout: the full payload as a JSON column,
//! with `document_id` and `content_type` promoted to their own columns so
//! they can be pushed down as SQL predicates.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

pub const COL_ID: &str = "id";
pub const COL_DOCUMENT_ID: &str = "document_id";
pub const COL_CONTENT_TYPE: &str = "content_type";
pub const COL_PAYLOAD: &str = "payload";
pub const COL_VECTOR: &str = "vector";

/// Columns that exist outside the JSON payload.
pub const PROMOTED_COLUMNS: &[&str] = &[COL_DOCUMENT_ID, COL_CONTENT_TYPE];

/// Field for the fixed-size vector column.
pub fn vector_item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, true))
}

/// Schema for a collection table with `dimension`-wide vectors.
pub fn collection_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        Field::new(COL_DOCUMENT_ID, DataType::Utf8, false),
        Field::new(COL_CONTENT_TYPE, DataType::Utf8, false),
        Field::new(COL_PAYLOAD, DataType::Utf8, false),
        Field::new(
            COL_VECTOR,
            DataType::FixedSizeList(vector_item_field(), dimension),
            false,
        ),
    ])
}

/// Vector width recorded in a collection schema.
pub fn schema_dimension(schema: &Schema) -> Option<i32> {
    match schema.field_with_name(COL_VECTOR).ok()?.data_type() {
        DataType::FixedSizeList(_, dim) => Some(*dim),
        _ => None,
    }
}
