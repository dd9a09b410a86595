//! Configuration management for the retrieval engine
//!
//! Values resolve env > config file > defaults

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::geo::{DocType, GeoPoint};
use crate::retrieval::SourceGroup;
use crate::router::CategoryEntry;
use crate::{Error, Result};

/// Feldkirchen in Kärnten, center of the default exercise area
pub const DEFAULT_FALLBACK_CENTER: GeoPoint = GeoPoint::new(46.7239, 14.0947);

/// Retrieval engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory with JSONL and markdown knowledge files
    pub knowledge_dir: PathBuf,

    /// Directory with the vector index artifacts
    pub index_dir: PathBuf,

    /// Embedding service
    pub embedding: EmbeddingConfig,

    /// Vector retrieval
    pub rag: RagConfig,

    /// Geo index and scope
    pub geo: GeoConfig,

    /// Session store
    pub session: SessionConfig,

    /// Intent router
    pub router: RouterConfig,

    /// Context assembly
    pub retrieval: AssemblyConfig,
}

/// Embedding service configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of the Ollama-compatible service
    pub base_url: String,

    /// Embedding model name
    pub model: String,

    /// Upper bound for a single embedding call
    pub timeout: Duration,

    /// Number of cached query embeddings
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout: Duration::from_secs(30),
            cache_size: 256,
        }
    }
}

/// Vector retrieval configuration
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Number of chunks returned per query
    pub top_k: usize,

    /// Minimum cosine similarity for a chunk to qualify
    pub score_threshold: f32,

    /// Character cap for the knowledge section
    pub max_context_chars: usize,

    /// MMR trade-off between relevance and diversity, `None` disables MMR
    pub mmr_lambda: Option<f64>,

    /// MMR candidate pool as a multiple of `top_k`
    pub mmr_pool_factor: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.35,
            max_context_chars: 2500,
            mmr_lambda: None,
            mmr_pool_factor: 4,
        }
    }
}

/// Geo index and scope configuration
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Center used when nothing else locates the query
    pub fallback_center: Option<GeoPoint>,

    /// Margin around the incident spread when deriving a fence
    pub incident_padding_km: f64,

    /// Radius for radius queries without an explicit radius
    pub default_radius_km: f64,

    /// Doc types a bbox fence restricts
    pub fence_doc_types: Vec<DocType>,

    /// File name prefix of legacy markdown address files
    pub markdown_prefix: String,

    /// Result caps per query kind
    pub radius_limit: usize,
    pub bbox_limit: usize,
    pub nearest_limit: usize,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            fallback_center: Some(DEFAULT_FALLBACK_CENTER),
            incident_padding_km: 2.0,
            default_radius_km: 5.0,
            fence_doc_types: vec![DocType::Address, DocType::Poi, DocType::Building],
            markdown_prefix: "adressen_".to_string(),
            radius_limit: 50,
            bbox_limit: 100,
            nearest_limit: 5,
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub top_k: usize,
    pub min_score: f32,

    /// Recency half-life, `None` disables decay
    pub half_life: Option<Duration>,

    /// Items older than this are ignored by search
    pub max_age: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.3,
            half_life: None,
            max_age: None,
        }
    }
}

/// Intent router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Rules below this confidence only win when nothing else matches
    pub min_confidence: f32,

    /// Category norms listed for critical infrastructure queries
    pub critical_infra_norms: Vec<String>,

    /// Category words added to the built-in dictionary
    pub extra_categories: Vec<CategoryEntry>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            critical_infra_norms: [
                "amenity:hospital",
                "amenity:fire_station",
                "amenity:police",
                "amenity:pharmacy",
                "amenity:clinic",
                "emergency:ambulance_station",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            extra_categories: Vec::new(),
        }
    }
}

/// Context assembly configuration
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    /// Default total character budget
    pub max_chars: usize,

    /// Groups in the order they lose entries when over budget
    pub truncation_order: Vec<SourceGroup>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_chars: 6000,
            truncation_order: vec![SourceGroup::Session, SourceGroup::Knowledge, SourceGroup::Geo],
        }
    }
}

impl Config {
    /// Load configuration from the default config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a resolved value is out of range
    pub fn load() -> Result<Self> {
        Self::from_file(file::load_config_file())
    }

    /// Load configuration from an explicit config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a resolved value is out of range
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_file(file::load_config_file_from(path))
    }

    /// Configuration rooted at explicit directories, without env or file overlays
    #[must_use]
    pub fn with_dirs(knowledge_dir: impl Into<PathBuf>, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            knowledge_dir: knowledge_dir.into(),
            index_dir: index_dir.into(),
            embedding: EmbeddingConfig::default(),
            rag: RagConfig::default(),
            geo: GeoConfig::default(),
            session: SessionConfig::default(),
            router: RouterConfig::default(),
            retrieval: AssemblyConfig::default(),
        }
    }

    fn from_file(fc: file::RetrievalConfigFile) -> Result<Self> {
        let data_dir = default_data_dir();

        let knowledge_dir = std::env::var("EINFO_KNOWLEDGE_DIR")
            .ok()
            .map(PathBuf::from)
            .or(fc.paths.knowledge_dir)
            .unwrap_or_else(|| data_dir.join("knowledge"));
        let index_dir = std::env::var("EINFO_INDEX_DIR")
            .ok()
            .map(PathBuf::from)
            .or(fc.paths.index_dir)
            .unwrap_or_else(|| data_dir.join("knowledge_index"));

        let defaults = EmbeddingConfig::default();
        let embedding = EmbeddingConfig {
            base_url: std::env::var("EINFO_EMBED_URL")
                .or_else(|_| std::env::var("OLLAMA_BASE_URL"))
                .ok()
                .or(fc.embedding.base_url)
                .unwrap_or(defaults.base_url),
            model: std::env::var("EINFO_EMBED_MODEL")
                .ok()
                .or(fc.embedding.model)
                .unwrap_or(defaults.model),
            timeout: env_parse::<u64>("EINFO_EMBED_TIMEOUT_SECS")
                .or(fc.embedding.timeout_secs)
                .map_or(defaults.timeout, Duration::from_secs),
            cache_size: fc.embedding.cache_size.unwrap_or(defaults.cache_size),
        };

        let defaults = RagConfig::default();
        let rag = RagConfig {
            top_k: env_parse("EINFO_RAG_TOP_K")
                .or(fc.rag.top_k)
                .unwrap_or(defaults.top_k),
            score_threshold: env_parse("EINFO_RAG_THRESHOLD")
                .or(fc.rag.score_threshold)
                .unwrap_or(defaults.score_threshold),
            max_context_chars: env_parse("EINFO_RAG_MAX_CONTEXT_CHARS")
                .or(fc.rag.max_context_chars)
                .unwrap_or(defaults.max_context_chars),
            mmr_lambda: env_parse("EINFO_RAG_MMR_LAMBDA").or(fc.rag.mmr_lambda),
            mmr_pool_factor: fc.rag.mmr_pool_factor.unwrap_or(defaults.mmr_pool_factor),
        };

        let defaults = GeoConfig::default();
        let fence_doc_types = match fc.geo.fence_doc_types {
            Some(names) => names
                .iter()
                .map(|name| {
                    DocType::from_str(name)
                        .map_err(|()| Error::Config(format!("unknown fence doc type: {name}")))
                })
                .collect::<Result<Vec<_>>>()?,
            None => defaults.fence_doc_types,
        };
        let geo = GeoConfig {
            fallback_center: fc
                .geo
                .fallback_center
                .map(|[lat, lon]| GeoPoint::new(lat, lon))
                .or(defaults.fallback_center),
            incident_padding_km: fc
                .geo
                .incident_padding_km
                .unwrap_or(defaults.incident_padding_km),
            default_radius_km: fc
                .geo
                .default_radius_km
                .unwrap_or(defaults.default_radius_km),
            fence_doc_types,
            markdown_prefix: fc.geo.markdown_prefix.unwrap_or(defaults.markdown_prefix),
            radius_limit: fc.geo.radius_limit.unwrap_or(defaults.radius_limit),
            bbox_limit: fc.geo.bbox_limit.unwrap_or(defaults.bbox_limit),
            nearest_limit: fc.geo.nearest_limit.unwrap_or(defaults.nearest_limit),
        };

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            top_k: fc.session.top_k.unwrap_or(defaults.top_k),
            min_score: fc.session.min_score.unwrap_or(defaults.min_score),
            half_life: env_parse::<u64>("EINFO_SESSION_HALF_LIFE_SECS")
                .or(fc.session.half_life_secs)
                .map(Duration::from_secs),
            max_age: fc.session.max_age_secs.map(Duration::from_secs),
        };

        let defaults = RouterConfig::default();
        let router = RouterConfig {
            min_confidence: fc.router.min_confidence.unwrap_or(defaults.min_confidence),
            critical_infra_norms: fc
                .router
                .critical_infra_norms
                .unwrap_or(defaults.critical_infra_norms),
            extra_categories: fc
                .router
                .categories
                .into_iter()
                .map(CategoryEntry::try_from)
                .collect::<Result<Vec<_>>>()?,
        };

        let defaults = AssemblyConfig::default();
        let truncation_order = match fc.retrieval.truncation_order {
            Some(names) => names
                .iter()
                .map(|name| {
                    SourceGroup::from_str(name)
                        .map_err(|()| Error::Config(format!("unknown source group: {name}")))
                })
                .collect::<Result<Vec<_>>>()?,
            None => defaults.truncation_order,
        };
        let retrieval = AssemblyConfig {
            max_chars: env_parse("EINFO_MAX_CHARS")
                .or(fc.retrieval.max_chars)
                .unwrap_or(defaults.max_chars),
            truncation_order,
        };

        let config = Self {
            knowledge_dir,
            index_dir,
            embedding,
            rag,
            geo,
            session,
            router,
            retrieval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that resolved values are usable
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.rag.top_k == 0 {
            return Err(Error::Config("rag.top_k must be at least 1".to_string()));
        }
        if let Some(lambda) = self.rag.mmr_lambda
            && !(0.0..=1.0).contains(&lambda)
        {
            return Err(Error::Config(format!(
                "rag.mmr_lambda must be within [0, 1], got {lambda}"
            )));
        }
        if self.embedding.timeout.is_zero() {
            return Err(Error::Config("embedding timeout must be positive".to_string()));
        }
        if let Some(center) = self.geo.fallback_center
            && !center.is_valid()
        {
            return Err(Error::Config(format!(
                "geo.fallback_center out of range: {}, {}",
                center.lat, center.lon
            )));
        }
        if !(0.0..=1.0).contains(&self.router.min_confidence) {
            return Err(Error::Config(
                "router.min_confidence must be within [0, 1]".to_string(),
            ));
        }
        if matches!(self.session.half_life, Some(h) if h.is_zero()) {
            return Err(Error::Config("session half-life must be positive".to_string()));
        }
        Ok(())
    }
}

/// Parse an env var, warning when it is set but unparseable
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if let Ok(value) = raw.trim().parse() {
        Some(value)
    } else {
        tracing::warn!(key, value = %raw, "ignoring unparseable environment variable");
        None
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".einfo"),
        |dirs| dirs.data_dir().join("einfo"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::with_dirs("/tmp/k", "/tmp/i");
        assert!(config.validate().is_ok());
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.geo.fallback_center, Some(DEFAULT_FALLBACK_CENTER));
        assert_eq!(config.retrieval.truncation_order[0], SourceGroup::Session);
    }

    #[test]
    fn test_file_overlay() {
        let fc: file::RetrievalConfigFile = toml::from_str(
            r#"
            [paths]
            knowledge_dir = "/srv/knowledge"

            [rag]
            top_k = 8
            mmr_lambda = 0.6

            [geo]
            fence_doc_types = ["poi", "buildings"]

            [retrieval]
            truncation_order = ["knowledge", "session", "geo"]
            "#,
        )
        .unwrap();
        let config = Config::from_file(fc).unwrap();
        assert_eq!(config.rag.top_k, 8);
        assert_eq!(config.rag.mmr_lambda, Some(0.6));
        assert_eq!(config.geo.fence_doc_types, vec![DocType::Poi, DocType::Building]);
        assert_eq!(config.retrieval.truncation_order[0], SourceGroup::Knowledge);
    }

    #[test]
    fn test_rejects_invalid_lambda() {
        let mut config = Config::with_dirs("/tmp/k", "/tmp/i");
        config.rag.mmr_lambda = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_group() {
        let fc: file::RetrievalConfigFile = toml::from_str(
            r#"
            [retrieval]
            truncation_order = ["weather"]
            "#,
        )
        .unwrap();
        assert!(Config::from_file(fc).is_err());
    }
}
