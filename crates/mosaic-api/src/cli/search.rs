//! `mosaic search` and `mosaic search-image`.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use mosaic_observe::attrs::{SPAN_SEARCH, SPAN_SEARCH_IMAGE};
use mosaic_types::config::RetrievalConfig;
use mosaic_types::modality::Modality;
use mosaic_types::retrieval::{MultimodalSearchOptions, RetrievedItem, SearchOptions};
use mosaic_types::vector::PayloadFilter;
use tracing::Instrument;

use super::{truncate, SearchArgs, SearchMode};
use crate::state::AppState;

/// Search with a text query.
pub async fn search_text(state: &AppState, query: &str, args: &SearchArgs, json: bool) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    state.ensure_ready().await?;

    let span = tracing::info_span!(SPAN_SEARCH, mode = ?args.mode);
    let items = async {
        match args.mode {
            SearchMode::Text => state.retrieval.search_text(query, &single_options(&state.config.retrieval, args)).await,
            SearchMode::Images => state.retrieval.search_images(query, &single_options(&state.config.retrieval, args)).await,
            SearchMode::Multi => {
                state
                    .retrieval
                    .search_multimodal(query, &multimodal_options(&state.config.retrieval, args))
                    .await
            }
        }
    }
    .instrument(span)
    .await?;

    print_results(&items, query, json)
}

/// Search with an image file as the query.
pub async fn search_image(state: &AppState, path: &Path, args: &SearchArgs, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image {}", path.display()))?;
    state.ensure_ready().await?;

    let items = state
        .retrieval
        .search_with_image(&bytes, &multimodal_options(&state.config.retrieval, args))
        .instrument(tracing::info_span!(SPAN_SEARCH_IMAGE, bytes = bytes.len()))
        .await?;

    print_results(&items, &path.display().to_string(), json)
}

fn filter(args: &SearchArgs) -> Option<PayloadFilter> {
    args.document.as_ref().map(PayloadFilter::for_document)
}

fn single_options(defaults: &RetrievalConfig, args: &SearchArgs) -> SearchOptions {
    SearchOptions {
        limit: args.limit.unwrap_or(defaults.default_limit),
        threshold: Some(args.threshold.unwrap_or(defaults.default_threshold)),
        filter: filter(args),
    }
}

fn multimodal_options(defaults: &RetrievalConfig, args: &SearchArgs) -> MultimodalSearchOptions {
    MultimodalSearchOptions {
        limit: args.limit.unwrap_or(defaults.default_limit),
        threshold: Some(args.threshold.unwrap_or(defaults.default_threshold)),
        include_text: args.mode != SearchMode::Images,
        include_images: args.mode != SearchMode::Text,
        boost_text_results: args.boost_text,
        boost_image_results: args.boost_images,
        filter: filter(args),
    }
}

fn print_results(items: &[RetrievedItem], query: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!();
        println!("  {} No results for '{}'", style("i").blue().bold(), style(query).cyan());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Score").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Document").fg(Color::White),
        Cell::new("Page").fg(Color::White),
        Cell::new("Match").fg(Color::White),
    ]);

    for (rank, item) in items.iter().enumerate() {
        let kind = match item.modality {
            Modality::Text => Cell::new("text").fg(Color::Cyan),
            Modality::Image => Cell::new("image").fg(Color::Magenta),
        };
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(format!("{:.3}", item.score)),
            kind,
            Cell::new(&item.document_title),
            Cell::new(item.page_number.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(describe(item)),
        ]);
    }

    println!();
    println!("  {} results for '{}'", style(items.len()).bold(), style(query).cyan());
    println!("{table}");
    println!();
    Ok(())
}

/// One-line description of a hit: a text excerpt or the image's shape.
fn describe(item: &RetrievedItem) -> String {
    match item.modality {
        Modality::Text => truncate(item.content.as_deref().unwrap_or(""), 80),
        Modality::Image => {
            let format = item.image_format.map(|f| f.to_string()).unwrap_or_else(|| "image".to_string());
            let size = match (item.width, item.height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => format!(" {w}x{h}"),
                _ => String::new(),
            };
            let caption = item
                .caption
                .as_deref()
                .map(|c| format!(" \"{}\"", truncate(c, 50)))
                .unwrap_or_default();
            format!("{format}{size}{caption}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_types::document::ImageFormat;
    use uuid::Uuid;

    fn item(modality: Modality) -> RetrievedItem {
        RetrievedItem {
            id: Uuid::now_v7(),
            score: 0.9,
            modality,
            document_id: Uuid::now_v7(),
            file_path: "/tmp/doc.md".to_string(),
            document_title: "Doc".to_string(),
            content: None,
            chunk_index: None,
            page_number: None,
            image_format: None,
            width: None,
            height: None,
            caption: None,
        }
    }

    fn args(mode: SearchMode) -> SearchArgs {
        SearchArgs {
            mode,
            limit: None,
            threshold: None,
            boost_text: false,
            boost_images: true,
            document: None,
        }
    }

    #[test]
    fn test_describe_text_hit() {
        let mut hit = item(Modality::Text);
        hit.content = Some("The quick\nbrown fox".to_string());
        assert_eq!(describe(&hit), "The quick brown fox");
    }

    #[test]
    fn test_describe_image_hit() {
        let mut hit = item(Modality::Image);
        hit.image_format = Some(ImageFormat::Png);
        hit.width = Some(640);
        hit.height = Some(480);
        assert_eq!(describe(&hit), format!("{} 640x480", ImageFormat::Png));
    }

    #[test]
    fn test_document_flag_becomes_filter() {
        let doc = Uuid::now_v7();
        let mut a = args(SearchMode::Multi);
        assert!(filter(&a).is_none());
        a.document = Some(doc);
        assert_eq!(filter(&a), Some(PayloadFilter::for_document(&doc)));
    }

    #[test]
    fn test_options_fall_back_to_config_defaults() {
        let defaults = RetrievalConfig {
            default_limit: 7,
            default_threshold: 0.25,
            ..RetrievalConfig::default()
        };
        let options = single_options(&defaults, &args(SearchMode::Text));
        assert_eq!(options.limit, 7);
        assert_eq!(options.threshold, Some(0.25));

        let mut explicit = args(SearchMode::Text);
        explicit.limit = Some(3);
        explicit.threshold = Some(0.5);
        let options = single_options(&defaults, &explicit);
        assert_eq!(options.limit, 3);
        assert_eq!(options.threshold, Some(0.5));
    }

    #[test]
    fn test_mode_controls_included_collections() {
        let defaults = RetrievalConfig::default();
        let text = multimodal_options(&defaults, &args(SearchMode::Text));
        assert!(text.include_text && !text.include_images);
        let images = multimodal_options(&defaults, &args(SearchMode::Images));
        assert!(!images.include_text && images.include_images);
        let multi = multimodal_options(&defaults, &args(SearchMode::Multi));
        assert!(multi.include_text && multi.include_images);
        assert!(multi.boost_image_results);
        assert!(!multi.boost_text_results);
    }
}
