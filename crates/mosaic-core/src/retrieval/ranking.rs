//! Merging and ranking hits from both modalities.

use std::cmp::Ordering;

use mosaic_types::modality::Modality;
use mosaic_types::vector::SearchHit;

/// Multiply every hit's score by `factor`. Scores are not clamped, so a
/// boosted cosine similarity may exceed 1.0.
pub fn apply_boost(hits: &mut [SearchHit], factor: f32) {
    for hit in hits {
        hit.score *= factor;
    }
}

/// Total order used for merged results: score descending, then text before
/// image, then id. Independent of the order the inputs arrived in.
pub fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.modality.cmp(&b.modality))
        .then_with(|| a.id.cmp(&b.id))
}

/// Merge per-modality hit lists into one ranked list of at most `limit`.
pub fn merge_ranked(text: Vec<SearchHit>, images: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    let mut merged = text;
    merged.extend(images);
    merged.sort_by(rank_order);
    merged.truncate(limit);
    merged
}

/// Count of merged hits per modality, for logging.
pub fn modality_counts(hits: &[SearchHit]) -> (usize, usize) {
    let text = hits.iter().filter(|h| h.modality == Modality::Text).count();
    (text, hits.len() - text)
}
