//! Progress reporting for the indexing pipeline.

use mosaic_types::indexing::ProgressUpdate;

/// Receives advisory progress updates. Handlers must not block.
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);
}

impl<F> ProgressHandler for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: ProgressUpdate) {
        self(update)
    }
}
