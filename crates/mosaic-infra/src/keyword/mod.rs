//! Keyword (full-text) index implementations.

pub mod sqlite;

use mosaic_core::indexing::keyword::{KeywordIndex, NoopKeywordIndex};
use mosaic_types::error::KeywordIndexError;
use mosaic_types::indexing::{KeywordHit, KeywordRecord};
use uuid::Uuid;

use self::sqlite::SqliteKeywordIndex;

/// Keyword index selected from config: SQLite FTS5 when enabled, a no-op
/// otherwise.
pub enum ConfiguredKeywordIndex {
    Sqlite(SqliteKeywordIndex),
    Disabled(NoopKeywordIndex),
}

impl ConfiguredKeywordIndex {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Sqlite(_))
    }

    /// Drop every chunk. No-op when disabled.
    pub async fn clear(&self) -> Result<u64, KeywordIndexError> {
        match self {
            Self::Sqlite(index) => index.clear().await,
            Self::Disabled(_) => Ok(0),
        }
    }

    pub async fn count(&self) -> Result<u64, KeywordIndexError> {
        match self {
            Self::Sqlite(index) => index.count().await,
            Self::Disabled(_) => Ok(0),
        }
    }
}

impl KeywordIndex for ConfiguredKeywordIndex {
    async fn add_chunks(&self, records: &[KeywordRecord]) -> Result<usize, KeywordIndexError> {
        match self {
            Self::Sqlite(index) => index.add_chunks(records).await,
            Self::Disabled(index) => index.add_chunks(records).await,
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>, KeywordIndexError> {
        match self {
            Self::Sqlite(index) => index.search(query, limit).await,
            Self::Disabled(index) => index.search(query, limit).await,
        }
    }

    async fn delete_document(&self, document_id: &Uuid) -> Result<u64, KeywordIndexError> {
        match self {
            Self::Sqlite(index) => index.delete_document(document_id).await,
            Self::Disabled(index) => index.delete_document(document_id).await,
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            Self::Sqlite(index) => index.is_ready(),
            Self::Disabled(index) => index.is_ready(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_index_accepts_everything() {
        let index = ConfiguredKeywordIndex::Disabled(NoopKeywordIndex);
        assert!(!index.is_enabled());
        assert!(index.is_ready());
        assert_eq!(index.add_chunks(&[]).await.unwrap(), 0);
        assert!(index.search("anything", 10).await.unwrap().is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(index.clear().await.unwrap(), 0);
    }
}
