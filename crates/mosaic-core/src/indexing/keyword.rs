//! Keyword (full-text) index trait.
//!
//! The keyword index is a best-effort secondary writer: the indexer never
//! lets its failures affect vector storage.

use mosaic_types::error::KeywordIndexError;
use mosaic_types::indexing::{KeywordHit, KeywordRecord};
use uuid::Uuid;

/// Port for a lexical search index over chunk text.
pub trait KeywordIndex: Send + Sync {
    /// Insert or replace chunk records by id. Returns the number written.
    fn add_chunks(
        &self,
        records: &[KeywordRecord],
    ) -> impl std::future::Future<Output = Result<usize, KeywordIndexError>> + Send;

    /// Ranked lexical matches, best first.
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<KeywordHit>, KeywordIndexError>> + Send;

    /// Remove every chunk of a document. Returns the number removed.
    fn delete_document(
        &self,
        document_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, KeywordIndexError>> + Send;

    fn is_ready(&self) -> bool;
}

/// Keyword index used when lexical indexing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeywordIndex;

impl KeywordIndex for NoopKeywordIndex {
    async fn add_chunks(&self, _records: &[KeywordRecord]) -> Result<usize, KeywordIndexError> {
        Ok(0)
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<KeywordHit>, KeywordIndexError> {
        Ok(Vec::new())
    }

    async fn delete_document(&self, _document_id: &Uuid) -> Result<u64, KeywordIndexError> {
        Ok(0)
    }

    fn is_ready(&self) -> bool {
        true
    }
}
