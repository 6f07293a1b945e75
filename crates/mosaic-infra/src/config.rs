//! Configuration loader for Mosaic.
//!
//! Reads `config.toml` from the data directory (`~/.mosaic/` in production)
//! and deserializes it into [`MosaicConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies environment overrides and
//! resolves unset paths against the data directory.

use std::path::{Path, PathBuf};

use mosaic_types::config::MosaicConfig;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "MOSAIC_DATA_DIR";
pub const QDRANT_URL_ENV: &str = "MOSAIC_QDRANT_URL";
pub const QDRANT_API_KEY_ENV: &str = "MOSAIC_QDRANT_API_KEY";

/// Resolve the data directory: `MOSAIC_DATA_DIR`, else `~/.mosaic`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mosaic")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: logs a warning, defaults.
///
/// Environment overrides and path defaults are applied in every case.
pub async fn load_config(data_dir: &Path) -> MosaicConfig {
    let mut config = read_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    resolve_paths(&mut config, data_dir);
    config
}

async fn read_config_file(data_dir: &Path) -> MosaicConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return MosaicConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return MosaicConfig::default();
        }
    };

    match toml::from_str::<MosaicConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            MosaicConfig::default()
        }
    }
}

/// Apply `MOSAIC_QDRANT_URL` / `MOSAIC_QDRANT_API_KEY` from `lookup`.
///
/// Empty values are ignored.
pub fn apply_env_overrides(config: &mut MosaicConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(QDRANT_URL_ENV) {
        tracing::debug!(url = %url, "vector store url overridden from environment");
        config.vector_store.url = url;
    }
    if let Some(key) = non_empty(QDRANT_API_KEY_ENV) {
        config.vector_store.api_key = Some(key);
    }
}

/// Fill unset paths with their data-directory defaults.
///
/// Relative paths from the file are resolved against the data directory too.
pub fn resolve_paths(config: &mut MosaicConfig, data_dir: &Path) {
    config.embedding.cache_dir = Some(anchor(config.embedding.cache_dir.take(), data_dir, "models"));
    config.vector_store.lance_path = Some(anchor(config.vector_store.lance_path.take(), data_dir, "vectors"));
    config.keyword_index.database = Some(anchor(config.keyword_index.database.take(), data_dir, "keyword.db"));
}

fn anchor(path: Option<PathBuf>, data_dir: &Path, default_name: &str) -> PathBuf {
    match path {
        Some(p) if p.is_absolute() => p,
        Some(p) => data_dir.join(p),
        None => data_dir.join(default_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_types::config::{EmbeddingBackendKind, VectorBackendKind};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_config_missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.embedding.dimension, 512);
        assert_eq!(config.vector_store.backend, VectorBackendKind::Qdrant);
    }

    #[tokio::test]
    async fn test_load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[embedding]
backend = "clip_service"

[vector_store]
backend = "lance"
lance_path = "lance"

[indexing]
chunk_size = 400
chunk_overlap = 40
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.embedding.backend, EmbeddingBackendKind::ClipService);
        assert_eq!(config.vector_store.backend, VectorBackendKind::Lance);
        assert_eq!(config.indexing.chunk_size, 400);
        assert_eq!(config.vector_store.lance_path, Some(tmp.path().join("lance")));
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.indexing.chunk_size, 1000);
    }

    #[test]
    fn test_env_overrides_replace_url_and_key() {
        let mut config = MosaicConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            QDRANT_URL_ENV => Some("http://qdrant:6333".to_string()),
            QDRANT_API_KEY_ENV => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.vector_store.url, "http://qdrant:6333");
        assert_eq!(config.vector_store.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_env_overrides_ignore_empty_values() {
        let mut config = MosaicConfig::default();
        apply_env_overrides(&mut config, |_| Some("  ".to_string()));
        assert_eq!(config.vector_store.url, "http://localhost:6333");
        assert!(config.vector_store.api_key.is_none());
    }

    #[test]
    fn test_resolve_paths_defaults_under_data_dir() {
        let data_dir = PathBuf::from("/data/mosaic");
        let mut config = MosaicConfig::default();
        config.keyword_index.database = Some(PathBuf::from("/var/kw.db"));
        resolve_paths(&mut config, &data_dir);

        assert_eq!(config.embedding.cache_dir, Some(data_dir.join("models")));
        assert_eq!(config.vector_store.lance_path, Some(data_dir.join("vectors")));
        assert_eq!(config.keyword_index.database, Some(PathBuf::from("/var/kw.db")));
    }
}
