//! `mosaic keyword`: lexical search over the SQLite FTS5 index.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use mosaic_core::indexing::keyword::KeywordIndex;
use mosaic_observe::attrs::SPAN_KEYWORD;
use tracing::Instrument;

use super::truncate;
use crate::state::AppState;

pub async fn keyword_search(state: &AppState, query: &str, limit: usize, json: bool) -> Result<()> {
    let keywords = state.indexer.keywords();
    if !keywords.is_enabled() {
        anyhow::bail!("keyword index is disabled (set keyword_index.enabled = true in config.toml)");
    }

    let hits = keywords
        .search(query, limit)
        .instrument(tracing::info_span!(SPAN_KEYWORD, limit))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!();
        println!("  {} No keyword matches for '{}'", style("i").blue().bold(), style(query).cyan());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Rank").fg(Color::White),
        Cell::new("Document").fg(Color::White),
        Cell::new("Chunk").fg(Color::White),
        Cell::new("Page").fg(Color::White),
        Cell::new("Snippet").fg(Color::White),
    ]);

    for (position, hit) in hits.iter().enumerate() {
        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(format!("{:.2}", hit.rank)).fg(Color::DarkGrey),
            Cell::new(&hit.document_title),
            Cell::new(hit.chunk_index),
            Cell::new(hit.page_number),
            Cell::new(truncate(&hit.snippet, 90)),
        ]);
    }

    println!();
    println!("  {} keyword matches for '{}'", style(hits.len()).bold(), style(query).cyan());
    println!("{table}");
    println!();
    Ok(())
}
