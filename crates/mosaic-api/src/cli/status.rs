//! `mosaic status`: probe every backend and report readiness.
//!
//! Unlike the other commands this never fails because a backend is down;
//! each component is initialized on its own and its error is shown.

use anyhow::Result;
use console::style;
use mosaic_core::indexing::keyword::KeywordIndex;
use mosaic_types::config::{EmbeddingBackendKind, VectorBackendKind};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ComponentStatus {
    name: &'static str,
    backend: String,
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentStatus {
    fn from_result<E: std::fmt::Display>(name: &'static str, backend: String, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                name,
                backend,
                ready: true,
                error: None,
            },
            Err(e) => Self {
                name,
                backend,
                ready: false,
                error: Some(e.to_string()),
            },
        }
    }
}

pub async fn show_status(state: &AppState, json: bool) -> Result<()> {
    let embedding_backend = match state.config.embedding.backend {
        EmbeddingBackendKind::Fastembed => format!("fastembed ({})", state.config.embedding.model),
        EmbeddingBackendKind::ClipService => format!("clip service ({})", state.config.embedding.service_url),
    };
    let vector_backend = match state.config.vector_store.backend {
        VectorBackendKind::Qdrant => format!("qdrant ({})", state.config.vector_store.url),
        VectorBackendKind::Lance => "lance (embedded)".to_string(),
    };

    let embeddings = ComponentStatus::from_result("embeddings", embedding_backend, state.embeddings.initialize().await);
    let vectors = ComponentStatus::from_result("vector store", vector_backend, state.vectors.initialize().await);

    let keywords = state.indexer.keywords();
    let keyword_status = ComponentStatus {
        name: "keyword index",
        backend: if keywords.is_enabled() {
            "sqlite fts5".to_string()
        } else {
            "disabled".to_string()
        },
        ready: keywords.is_ready(),
        error: None,
    };

    let components = vec![embeddings, vectors, keyword_status];
    let ready = state.indexer.is_ready() && state.retrieval.is_ready();

    if json {
        let out = serde_json::json!({
            "data_dir": state.data_dir,
            "ready": ready,
            "components": components,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Mosaic status ({})",
        style("🔍").bold(),
        style(state.data_dir.display()).dim()
    );
    println!();
    for component in &components {
        let mark = if component.ready {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {} {:<14} {}", mark, component.name, style(&component.backend).dim());
        if let Some(error) = &component.error {
            println!("      {}", style(error).red());
        }
    }
    println!();
    if ready {
        println!("  {} Ready to index and search", style("●").green());
    } else {
        println!("  {} Not ready", style("○").yellow());
    }
    println!();
    Ok(())
}
