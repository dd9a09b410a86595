//! In-memory vector store for live exercise data
//!
//! Messages, tasks and status updates of the running exercise are embedded as
//! they arrive and searched alongside the static knowledge base. Nothing here
//! is persisted; [`SessionManager::end`] hands back an export for archiving.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::Result;
use crate::config::SessionConfig;
use crate::embedder::Embedder;
use crate::knowledge::cosine_similarity;

/// Header of the rendered session context
const CONTEXT_HEADER: &str = "### AKTUELLE EINSATZDATEN ###\n\n";

/// Similarity floor for [`SessionStore::context_for_query`]
const CONTEXT_MIN_SCORE: f32 = 0.25;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Metadata attached to a session item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    /// Item kind such as `meldung`, `aufgabe` or `lage`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Set by the store on insert
    #[serde(default)]
    pub scenario_id: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionMeta {
    #[must_use]
    pub fn of_type(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Add a free-form field
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Overlay `newer` onto these fields; set values in `newer` win
    fn merge(&mut self, newer: Self) {
        if newer.kind.is_some() {
            self.kind = newer.kind;
        }
        self.extra.extend(newer.extra);
    }
}

/// Embedded session entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub id: String,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub meta: SessionMeta,
    pub added_at: DateTime<Utc>,
}

/// Options for a session search
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub top_k: usize,

    /// Minimum raw similarity, applied before decay
    pub min_score: f32,

    /// Only items of this kind
    pub kind: Option<String>,

    /// Items older than this are skipped
    pub max_age: Option<Duration>,

    /// Score halves every `half_life`; `None` disables decay
    pub half_life: Option<Duration>,
}

impl SessionQuery {
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
            kind: None,
            max_age: config.max_age,
            half_life: config.half_life,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Session search result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHit {
    pub id: String,
    pub text: String,
    pub meta: SessionMeta,

    /// Similarity after decay, used for ranking
    pub score: f32,

    /// Raw cosine similarity
    pub similarity: f32,

    #[serde(with = "duration_secs")]
    pub age: Duration,
}

/// Item counts of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub scenario_id: String,
    pub total_items: usize,
    pub by_type: BTreeMap<String, usize>,
    pub created_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub age: Duration,
}

/// Archived session content, embeddings omitted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub scenario_id: String,
    pub exported_at: DateTime<Utc>,
    pub items: Vec<SessionItem>,
}

/// Vector store scoped to one exercise
pub struct SessionStore {
    scenario_id: String,
    created_at: DateTime<Utc>,
    embedder: Arc<dyn Embedder>,
    clock: Arc<dyn Clock>,
    items: RwLock<HashMap<String, SessionItem>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("scenario_id", &self.scenario_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create an empty store; without a scenario id one is generated
    #[must_use]
    pub fn new(scenario_id: Option<String>, embedder: Arc<dyn Embedder>, clock: Arc<dyn Clock>) -> Self {
        let scenario_id = scenario_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("session_{}", Uuid::new_v4().as_simple()));
        let created_at = clock.now();
        tracing::info!(scenario_id = %scenario_id, "session store created");
        Self {
            scenario_id,
            created_at,
            embedder,
            clock,
            items: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Embed and store an item, replacing any item with the same id
    ///
    /// Blank text is ignored and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the embedding error; the store is left unchanged
    pub async fn add(&self, id: &str, text: &str, meta: SessionMeta) -> Result<Option<SessionItem>> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!(id, "ignoring blank session item");
            return Ok(None);
        }

        let embedding = self.embedder.embed(text).await?;
        let item = SessionItem {
            id: id.to_string(),
            text: text.to_string(),
            embedding,
            meta: SessionMeta {
                scenario_id: self.scenario_id.clone(),
                ..meta
            },
            added_at: self.clock.now(),
        };

        let mut items = self.items.write().await;
        items.insert(item.id.clone(), item.clone());
        tracing::debug!(
            id,
            kind = item.meta.kind.as_deref().unwrap_or("unknown"),
            items = items.len(),
            "session item added"
        );
        Ok(Some(item))
    }

    /// Re-embed an item, merging new metadata over the existing one
    ///
    /// Behaves like [`Self::add`] when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns the embedding error; the existing item is kept
    pub async fn update(&self, id: &str, text: &str, meta: SessionMeta) -> Result<Option<SessionItem>> {
        let existing = self.items.read().await.get(id).map(|item| item.meta.clone());
        let merged = match existing {
            Some(mut current) => {
                current.merge(meta);
                current
            }
            None => meta,
        };
        self.add(id, text, merged).await
    }

    /// Remove an item, returning whether it existed
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.items.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(id, "session item removed");
        }
        removed
    }

    /// Drop every item, returning how many were removed
    pub async fn clear(&self) -> usize {
        let mut items = self.items.write().await;
        let count = items.len();
        items.clear();
        tracing::info!(scenario_id = %self.scenario_id, cleared = count, "session cleared");
        count
    }

    /// Embed the query and search the session
    ///
    /// A blank query or an empty session returns no hits without calling
    /// the embedder.
    ///
    /// # Errors
    ///
    /// Returns the embedding error
    pub async fn search(&self, query: &str, params: &SessionQuery) -> Result<Vec<SessionHit>> {
        if query.trim().is_empty() || self.is_empty().await {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        Ok(self.search_with_vector(&vector, params).await)
    }

    /// Search with an already embedded query
    pub async fn search_with_vector(&self, query: &[f32], params: &SessionQuery) -> Vec<SessionHit> {
        let now = self.clock.now();
        let items = self.items.read().await;

        let mut hits: Vec<SessionHit> = items
            .values()
            .filter(|item| {
                params
                    .kind
                    .as_deref()
                    .is_none_or(|kind| item.meta.kind.as_deref() == Some(kind))
            })
            .filter_map(|item| {
                let age = (now - item.added_at).to_std().unwrap_or_default();
                if params.max_age.is_some_and(|max| age > max) {
                    return None;
                }
                let similarity = cosine_similarity(query, &item.embedding);
                if similarity < params.min_score {
                    return None;
                }
                Some(SessionHit {
                    id: item.id.clone(),
                    text: item.text.clone(),
                    meta: item.meta.clone(),
                    score: decay(similarity, age, params.half_life),
                    similarity,
                    age,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        let found = hits.len();
        hits.truncate(params.top_k);

        tracing::debug!(found, returned = hits.len(), "session search");
        hits
    }

    /// Items of one kind, oldest first
    pub async fn by_type(&self, kind: &str) -> Vec<SessionItem> {
        let mut items: Vec<SessionItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.meta.kind.as_deref() == Some(kind))
            .cloned()
            .collect();
        sort_chronologically(&mut items);
        items
    }

    pub async fn stats(&self) -> SessionStats {
        let items = self.items.read().await;
        let mut by_type = BTreeMap::new();
        for item in items.values() {
            let kind = item.meta.kind.clone().unwrap_or_else(|| "unknown".to_string());
            *by_type.entry(kind).or_insert(0) += 1;
        }
        SessionStats {
            scenario_id: self.scenario_id.clone(),
            total_items: items.len(),
            by_type,
            created_at: self.created_at,
            age: (self.clock.now() - self.created_at).to_std().unwrap_or_default(),
        }
    }

    /// All items without embeddings, oldest first
    pub async fn export(&self) -> SessionExport {
        let mut items: Vec<SessionItem> = self
            .items
            .read()
            .await
            .values()
            .map(|item| SessionItem {
                embedding: Vec::new(),
                ..item.clone()
            })
            .collect();
        sort_chronologically(&mut items);
        SessionExport {
            scenario_id: self.scenario_id.clone(),
            exported_at: self.clock.now(),
            items,
        }
    }

    /// Render the best matches as `[kind] text` lines under a header
    ///
    /// Lines that would exceed `max_chars` end the listing; without any
    /// match the result is empty.
    ///
    /// # Errors
    ///
    /// Returns the embedding error
    pub async fn context_for_query(&self, query: &str, max_chars: usize, top_k: usize) -> Result<String> {
        let params = SessionQuery {
            top_k,
            min_score: CONTEXT_MIN_SCORE,
            ..SessionQuery::default()
        };
        let hits = self.search(query, &params).await?;
        if hits.is_empty() {
            return Ok(String::new());
        }

        let mut context = CONTEXT_HEADER.to_string();
        for hit in hits {
            let entry = format!("[{}] {}\n", hit.meta.kind.as_deref().unwrap_or("info"), hit.text);
            if context.chars().count() + entry.chars().count() > max_chars {
                break;
            }
            context.push_str(&entry);
        }
        Ok(context)
    }
}

/// Exponential recency decay, `score × 2^(−age / half_life)`
fn decay(score: f32, age: Duration, half_life: Option<Duration>) -> f32 {
    match half_life {
        Some(half_life) if !half_life.is_zero() => {
            let factor = (-std::f64::consts::LN_2 * age.as_secs_f64() / half_life.as_secs_f64()).exp();
            #[allow(clippy::cast_possible_truncation)]
            let decayed = (f64::from(score) * factor) as f32;
            decayed
        }
        _ => score,
    }
}

fn sort_chronologically(items: &mut [SessionItem]) {
    items.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.id.cmp(&b.id)));
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Owns the store of the exercise currently running
pub struct SessionManager {
    embedder: Arc<dyn Embedder>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Arc<SessionStore>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, clock: Arc<dyn Clock>) -> Self {
        Self {
            embedder,
            clock,
            current: RwLock::new(None),
        }
    }

    /// Start a fresh session, discarding the previous one
    pub async fn start(&self, scenario_id: Option<String>) -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::new(
            scenario_id,
            Arc::clone(&self.embedder),
            Arc::clone(&self.clock),
        ));
        let previous = self.current.write().await.replace(Arc::clone(&store));
        if let Some(previous) = previous {
            let stats = previous.stats().await;
            tracing::info!(
                scenario_id = %stats.scenario_id,
                items = stats.total_items,
                "previous session replaced"
            );
        }
        store
    }

    /// Running session, if any
    pub async fn current(&self) -> Option<Arc<SessionStore>> {
        self.current.read().await.clone()
    }

    /// Running session, starting one when none is active or when it belongs
    /// to a different scenario
    pub async fn current_or_start(&self, scenario_id: Option<&str>) -> Arc<SessionStore> {
        let matches = |running: &str| scenario_id.is_none_or(|id| running == id);

        if let Some(store) = self.current().await
            && matches(store.scenario_id())
        {
            return store;
        }
        let mut current = self.current.write().await;
        if let Some(store) = current.as_ref()
            && matches(store.scenario_id())
        {
            return Arc::clone(store);
        }
        let store = Arc::new(SessionStore::new(
            scenario_id.map(str::to_string),
            Arc::clone(&self.embedder),
            Arc::clone(&self.clock),
        ));
        if let Some(previous) = current.replace(Arc::clone(&store)) {
            tracing::info!(
                previous = %previous.scenario_id(),
                scenario_id = %store.scenario_id(),
                "session switched to another scenario"
            );
        }
        store
    }

    /// End the running session and return its export
    pub async fn end(&self) -> Option<SessionExport> {
        let store = self.current.write().await.take()?;
        let export = store.export().await;
        tracing::info!(
            scenario_id = %export.scenario_id,
            items = export.items.len(),
            "session ended"
        );
        Some(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::Error;

    /// Maps known words onto fixed axes
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                return Err(Error::EmbeddingTimeout(Duration::from_secs(1)));
            }
            let lower = text.to_lowercase();
            Ok(["hochwasser", "brand", "strom"]
                .iter()
                .map(|w| if lower.contains(w) { 1.0 } else { 0.05 })
                .collect())
        }

        fn model(&self) -> &str {
            "keywords"
        }
    }

    struct FakeClock(Mutex<DateTime<Utc>>);

    impl FakeClock {
        fn new() -> Self {
            Self(Mutex::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap()))
        }

        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::TimeDelta::seconds(secs);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn store() -> (Arc<KeywordEmbedder>, Arc<FakeClock>, SessionStore) {
        let embedder = Arc::new(KeywordEmbedder::new());
        let clock = Arc::new(FakeClock::new());
        let store = SessionStore::new(
            Some("uebung-1".to_string()),
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (embedder, clock, store)
    }

    fn query(top_k: usize) -> SessionQuery {
        SessionQuery {
            top_k,
            min_score: 0.3,
            ..SessionQuery::default()
        }
    }

    #[tokio::test]
    async fn test_add_search_and_blank_text() {
        let (embedder, _clock, store) = store();
        store
            .add("m1", "Hochwasser in der Bahnhofstraße", SessionMeta::of_type("meldung"))
            .await
            .unwrap();
        store
            .add("m2", "Brand in der Scheune", SessionMeta::of_type("meldung"))
            .await
            .unwrap();
        assert!(store.add("m3", "   ", SessionMeta::default()).await.unwrap().is_none());
        assert_eq!(store.len().await, 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let hits = store.search("Wo steht das Hochwasser?", &query(5)).await.unwrap();
        assert_eq!(hits[0].id, "m1");
        assert_eq!(hits[0].meta.scenario_id, "uebung-1");
        assert!(hits.iter().all(|h| h.similarity >= 0.3));
    }

    #[tokio::test]
    async fn test_blank_query_skips_embedding() {
        let (embedder, _clock, store) = store();
        assert!(store.search("Hochwasser", &query(5)).await.unwrap().is_empty());
        store.add("m1", "Hochwasser", SessionMeta::default()).await.unwrap();
        assert!(store.search("  ", &query(5)).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_merges_meta() {
        let (_embedder, _clock, store) = store();
        store
            .add("t1", "Sandsäcke Hochwasser", SessionMeta::of_type("aufgabe").with("status", "offen"))
            .await
            .unwrap();
        let updated = store
            .update("t1", "Sandsäcke Hochwasser verteilt", SessionMeta::default().with("status", "erledigt").with("von", "S4"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.meta.kind.as_deref(), Some("aufgabe"));
        assert_eq!(updated.meta.extra["status"], "erledigt");
        assert_eq!(updated.meta.extra["von"], "S4");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_store_unchanged() {
        let (_embedder, _clock, store) = store();
        store.add("a", "Hochwasser", SessionMeta::default()).await.unwrap();
        let err = store.update("a", "FAIL", SessionMeta::default()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.len().await, 1);
        let export = store.export().await;
        assert_eq!(export.items[0].text, "Hochwasser");
    }

    #[tokio::test]
    async fn test_decay_prefers_recent_items() {
        let (_embedder, clock, store) = store();
        store.add("old", "Hochwasser alt", SessionMeta::default()).await.unwrap();
        clock.advance(3600);
        store.add("new", "Hochwasser neu", SessionMeta::default()).await.unwrap();

        let mut params = query(5);
        params.half_life = Some(Duration::from_secs(1800));
        let hits = store.search("Hochwasser", &params).await.unwrap();
        assert_eq!(hits[0].id, "new");
        let old = hits.iter().find(|h| h.id == "old").unwrap();
        assert!((old.score - old.similarity * 0.25).abs() < 1e-4);
        assert_eq!(old.age, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_max_age_and_kind_filters() {
        let (_embedder, clock, store) = store();
        store.add("old", "Hochwasser alt", SessionMeta::of_type("meldung")).await.unwrap();
        clock.advance(600);
        store.add("task", "Hochwasser Aufgabe", SessionMeta::of_type("aufgabe")).await.unwrap();

        let mut params = query(5);
        params.max_age = Some(Duration::from_secs(300));
        let hits = store.search("Hochwasser", &params).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "task");

        let hits = store.search("Hochwasser", &query(5).kind("meldung")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "old");
    }

    #[tokio::test]
    async fn test_stats_export_remove_clear() {
        let (_embedder, clock, store) = store();
        store.add("a", "Hochwasser", SessionMeta::of_type("meldung")).await.unwrap();
        clock.advance(10);
        store.add("b", "Brand", SessionMeta::default()).await.unwrap();

        assert_eq!(store.by_type("meldung").await[0].id, "a");
        let stats = store.stats().await;
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.by_type["meldung"], 1);
        assert_eq!(stats.by_type["unknown"], 1);
        assert_eq!(stats.age, Duration::from_secs(10));

        let export = store.export().await;
        let ids: Vec<&str> = export.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(export.items.iter().all(|i| i.embedding.is_empty()));
        let json = serde_json::to_value(&export).unwrap();
        assert!(json["items"][0].get("embedding").is_none());
        assert_eq!(json["items"][0]["meta"]["type"], "meldung");

        assert!(store.remove("a").await);
        assert!(!store.remove("a").await);
        assert_eq!(store.clear().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_context_for_query_respects_limit() {
        let (_embedder, _clock, store) = store();
        store.add("a", "Hochwasser Bahnhofstraße", SessionMeta::of_type("meldung")).await.unwrap();
        store.add("b", "Hochwasser Hauptplatz", SessionMeta::default()).await.unwrap();

        let full = store.context_for_query("Hochwasser", 2000, 5).await.unwrap();
        assert!(full.starts_with(CONTEXT_HEADER));
        assert!(full.contains("[meldung] Hochwasser Bahnhofstraße"));
        assert!(full.contains("[info] Hochwasser Hauptplatz"));

        let limit = CONTEXT_HEADER.chars().count() + 35;
        let cut = store.context_for_query("Hochwasser", limit, 5).await.unwrap();
        assert_eq!(cut.lines().filter(|l| l.starts_with('[')).count(), 1);

        assert!(store.context_for_query("Strom", 2000, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manager_lifecycle() {
        let manager = SessionManager::new(Arc::new(KeywordEmbedder::new()), Arc::new(FakeClock::new()));
        assert!(manager.current().await.is_none());
        assert!(manager.end().await.is_none());

        let first = manager.start(Some("u1".to_string())).await;
        first.add("a", "Hochwasser", SessionMeta::default()).await.unwrap();
        let second = manager.start(Some("u2".to_string())).await;
        assert_eq!(manager.current().await.unwrap().scenario_id(), "u2");
        assert!(second.is_empty().await);

        let export = manager.end().await.unwrap();
        assert_eq!(export.scenario_id, "u2");
        assert!(manager.current().await.is_none());

        let generated = manager.current_or_start(None).await;
        assert!(generated.scenario_id().starts_with("session_"));
        assert!(Arc::ptr_eq(&generated, &manager.current_or_start(None).await));
    }

    #[tokio::test]
    async fn test_current_or_start_switches_scenario() {
        let manager = SessionManager::new(Arc::new(KeywordEmbedder::new()), Arc::new(FakeClock::new()));

        let first = manager.current_or_start(Some("uebung-1")).await;
        first.add("a", "Hochwasser", SessionMeta::default()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &manager.current_or_start(Some("uebung-1")).await));
        assert!(Arc::ptr_eq(&first, &manager.current_or_start(None).await));

        let second = manager.current_or_start(Some("uebung-2")).await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.scenario_id(), "uebung-2");
        assert!(second.is_empty().await);
        assert_eq!(manager.current().await.unwrap().scenario_id(), "uebung-2");
    }
}
