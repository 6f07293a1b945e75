//! `mosaic stats`: collection sizes, keyword index size and query counters.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct StatsReport {
    collections: Vec<mosaic_types::vector::CollectionStats>,
    keyword_chunks: Option<u64>,
    retrieval: mosaic_types::retrieval::RetrievalStats,
}

pub async fn show_stats(state: &AppState, json: bool) -> Result<()> {
    state.ensure_ready().await?;

    let collections = state.vectors.get_stats().await?;
    let keywords = state.indexer.keywords();
    let keyword_chunks = if keywords.is_enabled() {
        Some(keywords.count().await?)
    } else {
        None
    };
    let retrieval = state.retrieval.stats().await;

    let report = StatsReport {
        collections,
        keyword_chunks,
        retrieval,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Collection").fg(Color::White),
        Cell::new("Modality").fg(Color::White),
        Cell::new("Points").fg(Color::White),
    ]);
    for collection in &report.collections {
        table.add_row(vec![
            Cell::new(&collection.name),
            Cell::new(collection.modality.to_string()),
            Cell::new(collection.points_count),
        ]);
    }
    table.add_row(vec![
        Cell::new("keyword index").fg(Color::DarkGrey),
        Cell::new("text"),
        match report.keyword_chunks {
            Some(count) => Cell::new(count),
            None => Cell::new("disabled").fg(Color::Yellow),
        },
    ]);

    println!();
    println!("  {} Mosaic statistics", style("📊").bold());
    println!("{table}");
    println!(
        "  {} model {} ({} dimensions)",
        style("·").dim(),
        style(state.embeddings.model_name()).cyan(),
        state.embeddings.dimension()
    );
    println!();
    Ok(())
}
