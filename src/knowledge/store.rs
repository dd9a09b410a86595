//! Lazily loaded embedding index with modification-time revalidation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::Chunk;
use crate::source::{ArtifactSource, Fingerprint};

/// Chunk metadata artifact
pub const META_FILE: &str = "meta.json";

/// Vector artifact, positionally aligned with [`META_FILE`]
pub const EMBEDDINGS_FILE: &str = "embeddings.json";

/// Source file recorded by the index builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub name: String,
    #[serde(rename = "chunkCount", alias = "chunks", default)]
    pub chunk_count: usize,
}

#[derive(Debug, Deserialize)]
struct MetaDocument {
    #[serde(default)]
    dim: Option<usize>,
    #[serde(default)]
    files: Vec<IndexedFile>,
    #[serde(default)]
    chunks: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsDocument {
    #[serde(default)]
    dim: Option<usize>,
    vectors: Vec<Vec<f32>>,
}

/// Loaded index: chunk `i` belongs to vector `i`
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    pub dim: usize,
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
    pub files: Vec<IndexedFile>,
    fingerprint: Fingerprint,
}

impl IndexSnapshot {
    /// Snapshot with no chunks
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from in-memory parts
    ///
    /// The dimension is taken from the first vector.
    #[must_use]
    pub fn from_parts(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Self {
        Self {
            dim: vectors.first().map_or(0, Vec::len),
            chunks,
            vectors,
            files: Vec::new(),
            fingerprint: Fingerprint::default(),
        }
    }

    /// Number of searchable entries
    ///
    /// With mismatched artifacts only the aligned prefix is searchable
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len().min(self.vectors.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        if index < self.len() {
            self.chunks.get(index)
        } else {
            None
        }
    }
}

/// Embedding store over `meta.json` and `embeddings.json`
///
/// Every [`Self::load`] compares modification times and reparses only when
/// an artifact changed. Load failures never propagate; they are logged and
/// the store serves an empty snapshot until the artifacts are fixed.
pub struct EmbeddingStore {
    source: Arc<dyn ArtifactSource>,
    meta_path: PathBuf,
    embeddings_path: PathBuf,
    snapshot: RwLock<Arc<IndexSnapshot>>,
}

impl std::fmt::Debug for EmbeddingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingStore")
            .field("meta_path", &self.meta_path)
            .field("embeddings_path", &self.embeddings_path)
            .finish_non_exhaustive()
    }
}

impl EmbeddingStore {
    #[must_use]
    pub fn new(source: Arc<dyn ArtifactSource>, index_dir: &Path) -> Self {
        Self {
            source,
            meta_path: index_dir.join(META_FILE),
            embeddings_path: index_dir.join(EMBEDDINGS_FILE),
            snapshot: RwLock::new(Arc::new(IndexSnapshot::empty())),
        }
    }

    /// Current snapshot without revalidation
    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Revalidate and return the current snapshot
    pub async fn load(&self) -> Arc<IndexSnapshot> {
        let paths = [self.meta_path.clone(), self.embeddings_path.clone()];
        let fingerprint = Fingerprint::capture(self.source.as_ref(), &paths).await;

        if !fingerprint.all_present() {
            tracing::error!(
                meta = %self.meta_path.display(),
                embeddings = %self.embeddings_path.display(),
                "vector index or embeddings not found"
            );
            return self.replace(IndexSnapshot::empty()).await;
        }

        {
            let current = self.snapshot.read().await;
            if current.fingerprint == fingerprint {
                return Arc::clone(&*current);
            }
        }

        match self.parse().await {
            Ok(mut snapshot) => {
                snapshot.fingerprint = fingerprint;
                tracing::info!(
                    chunks = snapshot.chunks.len(),
                    dim = snapshot.dim,
                    files = snapshot.files.len(),
                    "vector index loaded"
                );
                self.replace(snapshot).await
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load vector index");
                self.replace(IndexSnapshot::empty()).await
            }
        }
    }

    async fn replace(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().await = Arc::clone(&snapshot);
        snapshot
    }

    async fn parse(&self) -> crate::Result<IndexSnapshot> {
        let (meta_raw, embeddings_raw) = futures::try_join!(
            self.source.read_to_string(&self.meta_path),
            self.source.read_to_string(&self.embeddings_path),
        )?;

        let meta: MetaDocument = serde_json::from_str(&meta_raw)?;
        let embeddings: EmbeddingsDocument = serde_json::from_str(&embeddings_raw)?;

        if meta.chunks.len() != embeddings.vectors.len() {
            tracing::error!(
                chunks = meta.chunks.len(),
                vectors = embeddings.vectors.len(),
                "chunk count does not match vector count"
            );
        }

        let dim = meta
            .dim
            .or(embeddings.dim)
            .or_else(|| embeddings.vectors.first().map(Vec::len))
            .unwrap_or_default();

        let mismatched = embeddings.vectors.iter().filter(|v| v.len() != dim).count();
        if mismatched > 0 {
            tracing::warn!(dim, mismatched, "vectors with unexpected dimension score zero");
        }

        Ok(IndexSnapshot {
            dim,
            chunks: meta.chunks,
            vectors: embeddings.vectors,
            files: meta.files,
            fingerprint: Fingerprint::default(),
        })
    }
}
