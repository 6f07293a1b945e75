//! Mosaic CLI entry point.
//!
//! Binary name: `mosaic`
//!
//! Parses CLI arguments, sets up tracing, wires services from config, then
//! dispatches to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use mosaic_observe::attrs::SPAN_INDEX;
use mosaic_observe::tracing_setup::{default_filter, init_tracing, shutdown_tracing};
use mosaic_types::indexing::IndexOptions;
use tracing::Instrument;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(default_filter(cli.verbose, cli.quiet), cli.otel).map_err(|e| anyhow::anyhow!("{e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "mosaic", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Index {
            paths,
            chunk_size,
            chunk_overlap,
            no_images,
        } => {
            let options = IndexOptions {
                chunk_size,
                chunk_overlap,
                extract_images: no_images.then_some(false),
            };
            cli::index::index_paths(&state, &paths, options, cli.json, cli.quiet)
                .instrument(tracing::info_span!(SPAN_INDEX, inputs = paths.len()))
                .await?;
        }

        Commands::Search { query, args } => {
            cli::search::search_text(&state, &query, &args, cli.json).await?;
        }

        Commands::SearchImage { path, args } => {
            cli::search::search_image(&state, &path, &args, cli.json).await?;
        }

        Commands::Keyword { query, limit } => {
            cli::keyword::keyword_search(&state, &query, limit, cli.json).await?;
        }

        Commands::Stats => {
            cli::stats::show_stats(&state, cli.json).await?;
        }

        Commands::Delete { document_id, modality } => {
            cli::maintenance::delete_document(&state, document_id, modality, cli.json).await?;
        }

        Commands::Clear { target, force } => {
            cli::maintenance::clear(&state, target, force, cli.json).await?;
        }

        Commands::Status => {
            cli::status::show_status(&state, cli.json).await?;
        }

        // Handled before state init
        Commands::Completions { .. } => {}
    }

    Ok(())
}
