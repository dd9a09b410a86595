//! TOML configuration file loading
//!
//! Supports `~/.config/einfo/retrieval/config.toml` as a persistent config source.
//! All fields are optional, the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RetrievalConfigFile {
    /// Knowledge and index locations
    #[serde(default)]
    pub paths: PathsFileConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingFileConfig,

    /// Vector retrieval tuning
    #[serde(default)]
    pub rag: RagFileConfig,

    /// Geo index and scope configuration
    #[serde(default)]
    pub geo: GeoFileConfig,

    /// Session store configuration
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Intent router configuration
    #[serde(default)]
    pub router: RouterFileConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub retrieval: AssemblyFileConfig,
}

/// Filesystem locations
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    /// Directory with JSONL and markdown knowledge files
    pub knowledge_dir: Option<PathBuf>,

    /// Directory with `meta.json` and `embeddings.json`
    pub index_dir: Option<PathBuf>,
}

/// Embedding service configuration
#[derive(Debug, Default, Deserialize)]
pub struct EmbeddingFileConfig {
    /// Base URL of the Ollama-compatible service
    pub base_url: Option<String>,

    /// Embedding model name (e.g. "nomic-embed-text")
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Number of cached query embeddings
    pub cache_size: Option<usize>,
}

/// Vector retrieval tuning
#[derive(Debug, Default, Deserialize)]
pub struct RagFileConfig {
    pub top_k: Option<usize>,
    pub score_threshold: Option<f32>,
    pub max_context_chars: Option<usize>,

    /// MMR trade-off, unset disables diversity re-ranking
    pub mmr_lambda: Option<f64>,
    pub mmr_pool_factor: Option<usize>,
}

/// Geo configuration
#[derive(Debug, Default, Deserialize)]
pub struct GeoFileConfig {
    /// Fallback center as `[lat, lon]`
    pub fallback_center: Option<[f64; 2]>,
    pub incident_padding_km: Option<f64>,
    pub default_radius_km: Option<f64>,

    /// Doc types a bbox fence applies to (e.g. `["address", "poi"]`)
    pub fence_doc_types: Option<Vec<String>>,

    /// Prefix of legacy markdown address files
    pub markdown_prefix: Option<String>,
    pub radius_limit: Option<usize>,
    pub bbox_limit: Option<usize>,
    pub nearest_limit: Option<usize>,
}

/// Session store configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub half_life_secs: Option<u64>,
    pub max_age_secs: Option<u64>,
}

/// Intent router configuration
#[derive(Debug, Default, Deserialize)]
pub struct RouterFileConfig {
    pub min_confidence: Option<f32>,

    /// Category norms treated as critical infrastructure
    pub critical_infra_norms: Option<Vec<String>>,

    /// Additional category words
    #[serde(default)]
    pub categories: Vec<CategoryFileEntry>,
}

/// Category word entry, e.g. `{ label = "Bäckerei", stems = ["baecker"], norms = ["shop:bakery"] }`
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryFileEntry {
    pub label: String,
    pub stems: Vec<String>,
    pub norms: Vec<String>,

    /// Doc type filter implied by the word (e.g. "building")
    pub doc_type: Option<String>,
}

/// Context assembly configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssemblyFileConfig {
    /// Default total character budget
    pub max_chars: Option<usize>,

    /// Groups dropped first when over budget (e.g. `["session", "knowledge", "geo"]`)
    pub truncation_order: Option<Vec<String>>,
}

/// Resolve the config file path
///
/// Returns `~/.config/einfo/retrieval/config.toml` on all platforms
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(".config")
            .join("einfo")
            .join("retrieval")
            .join("config.toml")
    })
}

/// Load the config file from the default location
///
/// Returns defaults when the file is missing or fails to parse
#[must_use]
pub fn load_config_file() -> RetrievalConfigFile {
    config_file_path().map_or_else(RetrievalConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a config file from an explicit path
///
/// Returns defaults when the file is missing or fails to parse
#[must_use]
pub fn load_config_file_from(path: &Path) -> RetrievalConfigFile {
    if !path.exists() {
        return RetrievalConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RetrievalConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RetrievalConfigFile::default()
        }
    }
}
