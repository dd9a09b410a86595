//! EINFO Retrieval - context retrieval for disaster-exercise simulations
//!
//! This library assembles the context handed to the exercise's language
//! models:
//! - Vector search over a pre-built knowledge index
//! - Geo search over address, POI and building records
//! - A per-exercise session store of live events
//! - Rule-based intent routing that decides which of them to ask
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            retrieve(query, context, budget)          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   IntentRouter  │  GeoScopeResolver  │  Assembly     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │  EmbeddingStore  │  GeoIndex  │  SessionStore        │
//! │  meta.json + embeddings.json │ *.jsonl │ in memory   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod embedder;
pub mod error;
pub mod geo;
pub mod incident;
pub mod knowledge;
pub mod retrieval;
pub mod router;
pub mod session;
pub mod source;
pub mod text;

pub use config::Config;
pub use embedder::{Embedder, OllamaEmbedder};
pub use error::{Error, Result};
pub use geo::{BBox, GeoIndex, GeoPoint, GeoScope, GeoScopeResolver};
pub use incident::{Incident, IncidentBoard};
pub use knowledge::{ChunkFilter, EmbeddingStore, IndexSnapshot, SearchParams, cosine_similarity};
pub use retrieval::{Budget, RetrievalContext, RetrievalEngine, RetrievedContext, Source, SourceGroup};
pub use router::{Intent, IntentParams, IntentRouter, IntentType};
pub use session::{SessionManager, SessionMeta, SessionQuery, SessionStore};
pub use source::{ArtifactSource, DiskSource};
