//! `mosaic index`: run the indexing pipeline over files and directories.

use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use mosaic_core::indexing::indexer::normalize_path;
use mosaic_infra::parser::LocalFileParser;
use mosaic_types::indexing::{IndexOptions, IndexStage, IndexingResult, ProgressUpdate};

use crate::state::AppState;

/// Index every supported file under `paths`.
pub async fn index_paths(
    state: &AppState,
    paths: &[PathBuf],
    options: IndexOptions,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let files = collect_files(paths).await?;
    if files.is_empty() {
        anyhow::bail!("no supported files found in the given paths");
    }

    state.ensure_ready().await?;

    let bar = if json || quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar
    };

    let progress = {
        let bar = bar.clone();
        move |update: ProgressUpdate| {
            let name = file_name(&update.file_path);
            match update.stage {
                IndexStage::Done | IndexStage::Error => bar.inc(1),
                stage => bar.set_message(format!("{name}: {stage} ({}%)", update.progress)),
            }
        }
    };

    let results = state.indexer.index_files(&files, &options, Some(&progress)).await;
    bar.finish_and_clear();

    let failed = results.iter().filter(|r| !r.success).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if !quiet {
        print_summary(&results);
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed to index", results.len());
    }
    Ok(())
}

fn print_summary(results: &[IndexingResult]) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("File").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Chunks").fg(Color::White),
        Cell::new("Images").fg(Color::White),
        Cell::new("Vectors").fg(Color::White),
        Cell::new("Time").fg(Color::White),
        Cell::new("Document").fg(Color::White),
    ]);

    for result in results {
        let status = if result.success {
            Cell::new("✓ indexed").fg(Color::Green)
        } else {
            Cell::new("✗ failed").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(file_name(&result.file_path)),
            status,
            Cell::new(result.text_chunks_processed),
            Cell::new(result.images_processed),
            Cell::new(result.total_vectors_stored),
            Cell::new(format!("{}ms", result.processing_time_ms)),
            Cell::new(result.document_id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");

    for result in results.iter().filter(|r| !r.errors.is_empty()) {
        for error in &result.errors {
            println!(
                "  {} {}: {}",
                style("!").yellow().bold(),
                file_name(&result.file_path),
                style(error).dim()
            );
        }
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    let vectors: usize = results.iter().map(|r| r.total_vectors_stored).sum();
    println!();
    println!(
        "  {} Indexed {}/{} files ({} vectors)",
        style("✓").green().bold(),
        succeeded,
        results.len(),
        vectors
    );
    println!();
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Expand directories into the supported files beneath them, sorted.
/// Explicitly named files are kept even if unsupported so the indexer can
/// report them. Paths are normalized and each file is listed once.
async fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = normalize_path(path).await;
        if !tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
            if !files.contains(&path) {
                files.push(path);
            }
            continue;
        }

        let mut found = Vec::new();
        let mut pending = vec![path];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry_path);
                } else if file_type.is_file() && LocalFileParser::supports(&entry_path) {
                    found.push(entry_path);
                }
            }
        }
        found.sort();
        for file in found {
            if !files.contains(&file) {
                files.push(file);
            }
        }
    }
    Ok(files)
}
