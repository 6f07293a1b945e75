//! `mosaic delete` and `mosaic clear`.

use anyhow::Result;
use console::style;
use mosaic_observe::attrs::SPAN_MAINTENANCE;
use mosaic_types::modality::Modality;
use tracing::Instrument;
use uuid::Uuid;

use super::ClearTarget;
use crate::state::AppState;

pub async fn delete_document(state: &AppState, document_id: Uuid, modality: Option<Modality>, json: bool) -> Result<()> {
    state.ensure_ready().await?;
    state
        .indexer
        .remove_document(&document_id, modality)
        .instrument(tracing::info_span!(SPAN_MAINTENANCE, op = "delete", document_id = %document_id))
        .await?;

    let scope = modality.map(|m| m.to_string()).unwrap_or_else(|| "all".to_string());
    if json {
        let out = serde_json::json!({
            "document_id": document_id,
            "modality": scope,
            "deleted": true,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Deleted {} vectors for document {}",
            style("✓").green().bold(),
            scope,
            style(document_id).cyan()
        );
        println!();
    }
    Ok(())
}

pub async fn clear(state: &AppState, target: ClearTarget, force: bool, json: bool) -> Result<()> {
    if !force {
        anyhow::bail!("clearing deletes every indexed vector in the collection; re-run with --force");
    }
    state.ensure_ready().await?;

    let span = tracing::info_span!(SPAN_MAINTENANCE, op = "clear", target = ?target);
    let keyword_rows = async {
        for modality in target.modalities() {
            state.vectors.clear(modality).await?;
        }
        let removed = if target != ClearTarget::Image {
            state.indexer.keywords().clear().await?
        } else {
            0
        };
        Ok::<_, anyhow::Error>(removed)
    }
    .instrument(span)
    .await?;

    let cleared: Vec<String> = target
        .modalities()
        .into_iter()
        .map(|m| state.vectors.collection_name(m))
        .collect();

    if json {
        let out = serde_json::json!({
            "cleared": cleared,
            "keyword_rows_removed": keyword_rows,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        for name in &cleared {
            println!("  {} Cleared {}", style("✓").green().bold(), style(name).cyan());
        }
        if keyword_rows > 0 {
            println!("  {} Removed {} keyword entries", style("✓").green().bold(), keyword_rows);
        }
        println!();
    }
    Ok(())
}
