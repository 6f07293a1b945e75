//! Document parser trait.
//!
//! Text and image extraction is an external concern. Implementations live in
//! mosaic-infra.

use std::path::Path;

use mosaic_types::document::ParsedDocument;
use mosaic_types::error::ParseError;

/// Port for a text/image extraction engine.
pub trait DocumentParser: Send + Sync {
    /// Extract text, images and metadata from one file. Single attempt.
    fn parse(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<ParsedDocument, ParseError>> + Send;

    fn is_ready(&self) -> bool;
}
