//! SQLite FTS5 keyword index.
//!
//! Implements `KeywordIndex` from `mosaic-core`. Chunk rows live in
//! `keyword_chunks`; `keyword_chunks_fts` is an external-content FTS5 table
//! kept in sync by triggers, ranked with `bm25()`.

use chrono::{DateTime, Utc};
use mosaic_core::indexing::keyword::KeywordIndex;
use mosaic_types::error::KeywordIndexError;
use mosaic_types::indexing::{KeywordHit, KeywordRecord};
use sqlx::Row;
use uuid::Uuid;

use crate::sqlite::pool::DatabasePool;

/// SQLite-backed implementation of `KeywordIndex`.
pub struct SqliteKeywordIndex {
    pool: DatabasePool,
}

impl SqliteKeywordIndex {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Total number of indexed chunks.
    pub async fn count(&self) -> Result<u64, KeywordIndexError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM keyword_chunks")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| KeywordIndexError::Query(e.to_string()))?;
        Ok(n.max(0) as u64)
    }

    /// Remove every chunk.
    pub async fn clear(&self) -> Result<u64, KeywordIndexError> {
        let result = sqlx::query("DELETE FROM keyword_chunks")
            .execute(&self.pool.writer)
            .await
            .map_err(|e| KeywordIndexError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct HitRow {
    id: String,
    document_id: String,
    file_path: String,
    document_title: String,
    chunk_index: i64,
    page_number: i64,
    snippet: String,
    rank: f64,
}

impl HitRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            document_id: row.try_get("document_id")?,
            file_path: row.try_get("file_path")?,
            document_title: row.try_get("document_title")?,
            chunk_index: row.try_get("chunk_index")?,
            page_number: row.try_get("page_number")?,
            snippet: row.try_get("snippet")?,
            rank: row.try_get("bm25_rank")?,
        })
    }

    fn into_hit(self) -> Result<KeywordHit, KeywordIndexError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| KeywordIndexError::Query(format!("invalid chunk id: {e}")))?;
        let document_id = Uuid::parse_str(&self.document_id)
            .map_err(|e| KeywordIndexError::Query(format!("invalid document_id: {e}")))?;

        Ok(KeywordHit {
            id,
            document_id,
            file_path: self.file_path,
            document_title: self.document_title,
            chunk_index: self.chunk_index.max(0) as usize,
            page_number: self.page_number.max(0) as u32,
            snippet: self.snippet,
            rank: self.rank,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Turn free text into an FTS5 query: every whitespace-separated term is
/// quoted, so punctuation never reaches the FTS5 parser. Terms are ANDed.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

// ---------------------------------------------------------------------------
// KeywordIndex implementation
// ---------------------------------------------------------------------------

impl KeywordIndex for SqliteKeywordIndex {
    async fn add_chunks(&self, records: &[KeywordRecord]) -> Result<usize, KeywordIndexError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| KeywordIndexError::Connection(e.to_string()))?;

        for record in records {
            sqlx::query(
                r#"INSERT INTO keyword_chunks
                   (id, document_id, file_path, document_title, chunk_index, page_number, content, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT (id) DO UPDATE SET
                       document_id = excluded.document_id,
                       file_path = excluded.file_path,
                       document_title = excluded.document_title,
                       chunk_index = excluded.chunk_index,
                       page_number = excluded.page_number,
                       content = excluded.content,
                       created_at = excluded.created_at"#,
            )
            .bind(record.id.to_string())
            .bind(record.document_id.to_string())
            .bind(&record.file_path)
            .bind(&record.document_title)
            .bind(record.chunk_index as i64)
            .bind(i64::from(record.page_number))
            .bind(&record.content)
            .bind(format_datetime(&record.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| KeywordIndexError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| KeywordIndexError::Query(e.to_string()))?;

        tracing::debug!(count = records.len(), "keyword chunks written");
        Ok(records.len())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>, KeywordIndexError> {
        let Some(match_expr) = fts_query(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"SELECT c.id, c.document_id, c.file_path, c.document_title, c.chunk_index, c.page_number,
                      snippet(keyword_chunks_fts, 0, '[', ']', '...', 16) AS snippet,
                      bm25(keyword_chunks_fts) AS bm25_rank
               FROM keyword_chunks_fts
               JOIN keyword_chunks c ON c.rowid = keyword_chunks_fts.rowid
               WHERE keyword_chunks_fts MATCH ?
               ORDER BY bm25_rank ASC, c.id ASC
               LIMIT ?"#,
        )
        .bind(&match_expr)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| KeywordIndexError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                HitRow::from_row(row)
                    .map_err(|e| KeywordIndexError::Query(e.to_string()))?
                    .into_hit()
            })
            .collect()
    }

    async fn delete_document(&self, document_id: &Uuid) -> Result<u64, KeywordIndexError> {
        let result = sqlx::query("DELETE FROM keyword_chunks WHERE document_id = ?")
            .bind(document_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| KeywordIndexError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    fn is_ready(&self) -> bool {
        !self.pool.writer.is_closed()
    }
}
