//! Retrieval orchestration over the vector index, geo index and session store

use std::sync::Arc;

use tokio::sync::RwLock;

use super::assemble::{self, Entry, Section};
use super::paths::{self, HYBRID_TITLE, KNOWLEDGE_TITLE, NO_SESSION_RESULTS, RESOURCE_TITLE, SESSION_TITLE};
use super::{Budget, RetrievalContext, RetrievedContext, SourceGroup};
use crate::config::Config;
use crate::embedder::{Embedder, OllamaEmbedder};
use crate::geo::{GeoIndex, GeoScope, GeoScopeResolver, GeoSnapshot, ScopeContext};
use crate::knowledge::{EmbeddingStore, IndexSnapshot};
use crate::router::{Intent, IntentRouter, IntentType};
use crate::session::{Clock, SessionManager, SessionQuery, SessionStore, SystemClock};
use crate::source::{ArtifactSource, DiskSource};
use crate::{Error, Result};

/// Revalidated views of every index
#[derive(Debug, Clone)]
pub struct Snapshots {
    pub knowledge: Arc<IndexSnapshot>,
    pub geo: Arc<GeoSnapshot>,
    pub router: Arc<IntentRouter>,
}

/// Answers `retrieve(query, context, budget)` with a bounded context text
///
/// All indexes are revalidated against their artifacts before each query;
/// the query is embedded at most once and only when a vector search needs it.
pub struct RetrievalEngine {
    config: Config,
    embedder: Arc<dyn Embedder>,
    store: EmbeddingStore,
    geo: GeoIndex,
    sessions: SessionManager,
    scope: GeoScopeResolver,
    router: RwLock<Arc<IntentRouter>>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("model", &self.embedder.model())
            .field("store", &self.store)
            .field("geo", &self.geo)
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, source: Arc<dyn ArtifactSource>) -> Self {
        Self::with_clock(config, embedder, source, Arc::new(SystemClock))
    }

    /// Engine with an explicit clock for session timestamps
    #[must_use]
    pub fn with_clock(
        config: Config,
        embedder: Arc<dyn Embedder>,
        source: Arc<dyn ArtifactSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = EmbeddingStore::new(Arc::clone(&source), &config.index_dir);
        let geo = GeoIndex::new(
            source,
            config.knowledge_dir.clone(),
            config.index_dir.clone(),
            config.geo.markdown_prefix.clone(),
        );
        let sessions = SessionManager::new(Arc::clone(&embedder), clock);
        let scope = GeoScopeResolver::new(config.geo.incident_padding_km, config.geo.fallback_center);
        let router = RwLock::new(Arc::new(IntentRouter::new(&config.router, Vec::new())));

        Self {
            config,
            embedder,
            store,
            geo,
            sessions,
            scope,
            router,
        }
    }

    /// Engine backed by the configured embedding service and the local disk
    ///
    /// # Errors
    ///
    /// Returns error if the embedding client cannot be built
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
        Ok(Self::new(config, embedder, Arc::new(DiskSource)))
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    #[must_use]
    pub const fn geo(&self) -> &GeoIndex {
        &self.geo
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Router as of the last revalidation
    pub async fn router(&self) -> Arc<IntentRouter> {
        Arc::clone(&*self.router.read().await)
    }

    /// Reload every index whose artifacts changed
    ///
    /// The router is rebuilt when the municipality table changed.
    pub async fn ensure_fresh(&self) -> Snapshots {
        let (knowledge, geo) = tokio::join!(self.store.load(), self.geo.ensure_fresh());

        let current = self.router().await;
        let router = if current.municipalities() == geo.municipalities() {
            current
        } else {
            let rebuilt = Arc::new(current.with_municipalities(geo.municipalities().to_vec()));
            *self.router.write().await = Arc::clone(&rebuilt);
            tracing::debug!(municipalities = geo.municipalities().len(), "router rebuilt");
            rebuilt
        };

        Snapshots {
            knowledge,
            geo,
            router,
        }
    }

    /// Classify a query against fresh indexes
    pub async fn detect_intent(&self, query: &str) -> Intent {
        self.ensure_fresh().await.router.detect_intent(query)
    }

    /// Assemble the context for a query
    ///
    /// A blank query yields an empty context without touching any index.
    ///
    /// # Errors
    ///
    /// Returns an embedding error when the query embedding is needed and
    /// fails; hybrid queries degrade to geo results instead
    pub async fn retrieve(
        &self,
        query: &str,
        context: &RetrievalContext,
        budget: &Budget,
    ) -> Result<RetrievedContext> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(RetrievedContext::empty());
        }

        let snapshots = self.ensure_fresh().await;
        let intent = snapshots.router.detect_intent(query);
        let scope = self.resolve_scope(query, &intent, context, &snapshots);
        let sections = self.collect(query, &intent, &scope, &snapshots, budget).await?;

        let sections = assemble::fit_to_budget(sections, budget.max_chars, &self.config.retrieval.truncation_order);
        let text = assemble::render(&sections);
        let sources = assemble::sources(&sections);

        tracing::debug!(
            intent = %intent.intent_type,
            pattern = intent.pattern,
            sections = sections.len(),
            sources = sources.len(),
            chars = text.chars().count(),
            "context assembled"
        );

        Ok(RetrievedContext {
            text,
            sources,
            intent: Some(intent),
            scope: Some(scope),
        })
    }

    /// Like [`Self::retrieve`], but any failure yields an empty context
    pub async fn retrieve_or_empty(
        &self,
        query: &str,
        context: &RetrievalContext,
        budget: &Budget,
    ) -> RetrievedContext {
        match self.retrieve(query, context, budget).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed, continuing without context");
                RetrievedContext::empty()
            }
        }
    }

    fn resolve_scope(
        &self,
        query: &str,
        intent: &Intent,
        context: &RetrievalContext,
        snapshots: &Snapshots,
    ) -> GeoScope {
        let municipality = intent.params.municipality.as_deref().and_then(|name| {
            snapshots
                .geo
                .municipalities()
                .iter()
                .find(|m| m.municipality == name)
        });
        let ctx = ScopeContext {
            incidents: &context.incidents,
            request_bbox: context.request_bbox,
            geo_intent: intent.intent_type.is_geo() || snapshots.router.has_geo_context(query),
            municipality,
            query_point: intent.params.center,
        };
        self.scope.resolve(query, &ctx)
    }

    async fn collect(
        &self,
        query: &str,
        intent: &Intent,
        scope: &GeoScope,
        snapshots: &Snapshots,
        budget: &Budget,
    ) -> Result<Vec<Section>> {
        let kind = intent.intent_type;
        if kind.is_geo() {
            return Ok(vec![paths::geo_section(&snapshots.geo, intent, scope, &self.config.geo)]);
        }

        let session = match self.sessions.current().await {
            Some(store) if !store.is_empty().await => Some(store),
            _ => None,
        };
        let wants_knowledge = matches!(kind, IntentType::Semantic | IntentType::Resource | IntentType::Hybrid)
            && !snapshots.knowledge.is_empty();
        let wants_session = matches!(
            kind,
            IntentType::Semantic | IntentType::Relational | IntentType::Session | IntentType::Hybrid
        );

        let vector = if wants_knowledge || (wants_session && session.is_some()) {
            match self.embed_query(query, budget).await {
                Ok(vector) => Some(vector),
                Err(e) if kind == IntentType::Hybrid => {
                    tracing::warn!(error = %e, "query embedding failed, hybrid falls back to geo");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let knowledge = match &vector {
            Some(v) if wants_knowledge => {
                let filter = paths::knowledge_filter(&intent.params, scope, &self.config.geo);
                paths::knowledge_entries(&snapshots.knowledge, v, &filter, &self.config.rag)
            }
            _ => Vec::new(),
        };
        let session = match (&vector, session) {
            (Some(v), Some(store)) if wants_session => self.session_entries(&store, v).await,
            _ => Vec::new(),
        };

        let sections = match kind {
            IntentType::Hybrid => {
                let geo = paths::hybrid_geo_entries(&snapshots.geo, &intent.params, scope, &self.config.geo);
                vec![Section::new(
                    HYBRID_TITLE,
                    assemble::interleave(vec![geo, knowledge, session]),
                )]
            }
            IntentType::Resource => vec![Section::new(RESOURCE_TITLE, knowledge)],
            IntentType::Relational | IntentType::Session => {
                let session = if session.is_empty() {
                    vec![Entry::note(SourceGroup::Session, NO_SESSION_RESULTS)]
                } else {
                    session
                };
                vec![Section::new(SESSION_TITLE, session)]
            }
            _ => vec![
                Section::new(KNOWLEDGE_TITLE, knowledge),
                Section::new(SESSION_TITLE, session),
            ],
        };
        Ok(sections)
    }

    async fn session_entries(&self, store: &SessionStore, vector: &[f32]) -> Vec<Entry> {
        let params = SessionQuery::from_config(&self.config.session);
        paths::session_entries(store.search_with_vector(vector, &params).await)
    }

    async fn embed_query(&self, query: &str, budget: &Budget) -> Result<Vec<f32>> {
        match budget.timeout {
            Some(limit) => tokio::time::timeout(limit, self.embedder.embed(query))
                .await
                .map_err(|_| Error::EmbeddingTimeout(limit))?,
            None => self.embedder.embed(query).await,
        }
    }
}
