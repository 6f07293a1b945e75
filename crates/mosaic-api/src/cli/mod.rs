//! CLI command definitions for the `mosaic` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod index;
pub mod keyword;
pub mod maintenance;
pub mod search;
pub mod stats;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use mosaic_types::modality::Modality;
use uuid::Uuid;

/// Index documents and images, then search them by meaning.
#[derive(Parser)]
#[command(name = "mosaic", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index files or directories (text and images).
    Index {
        /// Files or directories to index. Directories are walked recursively.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Target chunk size in characters.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared between consecutive chunks.
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Skip image embedding.
        #[arg(long)]
        no_images: bool,
    },

    /// Search with a text query.
    Search {
        /// Natural-language query.
        query: String,

        #[command(flatten)]
        args: SearchArgs,
    },

    /// Search with an image file as the query.
    SearchImage {
        /// Image to search with.
        path: PathBuf,

        #[command(flatten)]
        args: SearchArgs,
    },

    /// Lexical (full-text) search over indexed text chunks.
    Keyword {
        query: String,

        /// Maximum results.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Collection sizes and query statistics.
    Stats,

    /// Delete a document's vectors and keyword entries.
    #[command(alias = "rm")]
    Delete {
        /// Document id (as shown in search results).
        document_id: Uuid,

        /// Only delete this modality (text or image).
        #[arg(long)]
        modality: Option<Modality>,
    },

    /// Drop and recreate collections.
    Clear {
        /// Which collection to clear.
        target: ClearTarget,

        /// Required: clearing cannot be undone.
        #[arg(long)]
        force: bool,
    },

    /// Readiness of every backend.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Options shared by text and image searches.
#[derive(clap::Args, Debug, Clone)]
pub struct SearchArgs {
    /// Which collections to search.
    #[arg(long, value_enum, default_value_t = SearchMode::Multi)]
    pub mode: SearchMode,

    /// Maximum results (defaults to `retrieval.default_limit`).
    #[arg(long)]
    pub limit: Option<usize>,

    /// Minimum score (defaults to `retrieval.default_threshold`).
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Multiply text scores by the configured text boost.
    #[arg(long)]
    pub boost_text: bool,

    /// Multiply image scores by the configured image boost.
    #[arg(long)]
    pub boost_images: bool,

    /// Restrict results to one document.
    #[arg(long)]
    pub document: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchMode {
    /// Text chunks only.
    Text,
    /// Images only.
    Images,
    /// Both collections, merged.
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearTarget {
    Text,
    Image,
    All,
}

impl ClearTarget {
    pub fn modalities(self) -> Vec<Modality> {
        match self {
            ClearTarget::Text => vec![Modality::Text],
            ClearTarget::Image => vec![Modality::Image],
            ClearTarget::All => Modality::ALL.to_vec(),
        }
    }
}

/// Shorten `text` to at most `max` characters on one line.
pub fn truncate(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
