//! In-memory geo index with snapshot swapping

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::dedupe::{DedupeKey, Deduper};
use super::distance::haversine_km;
use super::record::{Ingested, LocationRecord, MunicipalityEntry, parse_jsonl_record, parse_markdown_line};
use super::{BBox, DocType, GeoPoint};
use crate::source::{ArtifactSource, Fingerprint};
use crate::text::fold;

/// Most geocoding candidates returned
const GEOCODE_LIMIT: usize = 10;

/// Score factor for geocoding matches on records without coordinates
const UNLOCATED_FACTOR: f64 = 0.5;

/// Shortest municipality name part accepted as a match on its own
const MIN_MUNICIPALITY_PART: usize = 4;

/// Constraints applied to geo queries
#[derive(Debug, Clone, Default)]
pub struct GeoFilter {
    /// Allowed doc types, empty allows all
    pub doc_types: Vec<DocType>,

    /// Only records with a proper name
    pub named_only: bool,

    /// Category norms, empty allows all
    pub category_norms: Vec<String>,

    /// Fence; records without coordinates never pass a fence
    pub bbox: Option<BBox>,

    /// Maximum number of results
    pub limit: Option<usize>,
}

impl GeoFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn doc_types(mut self, types: impl IntoIterator<Item = DocType>) -> Self {
        self.doc_types = types.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn named_only(mut self) -> Self {
        self.named_only = true;
        self
    }

    #[must_use]
    pub fn categories(mut self, norms: &[String]) -> Self {
        self.category_norms = norms.to_vec();
        self
    }

    #[must_use]
    pub const fn within(mut self, bbox: Option<BBox>) -> Self {
        self.bbox = bbox;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record passes every constraint
    #[must_use]
    pub fn accepts(&self, record: &LocationRecord) -> bool {
        if !self.doc_types.is_empty() && !self.doc_types.contains(&record.doc_type) {
            return false;
        }
        if self.named_only && !record.is_named() {
            return false;
        }
        if !self.category_norms.is_empty() && !record.matches_category(&self.category_norms) {
            return false;
        }
        match (self.bbox, record.geo) {
            (Some(bbox), Some(point)) => bbox.contains(point),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    fn cap(&self) -> usize {
        self.limit.unwrap_or(usize::MAX)
    }
}

/// Location result with its distance from the query center
#[derive(Debug, Clone, Serialize)]
pub struct GeoHit {
    pub record: Arc<LocationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Geocoding candidate
#[derive(Debug, Clone, Serialize)]
pub struct GeocodeHit {
    pub record: Arc<LocationRecord>,
    pub score: f64,
}

/// Index statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeoStats {
    pub total: usize,
    pub named: usize,
    pub unnamed: usize,
    pub by_type: BTreeMap<String, usize>,
    pub source_files: usize,
    pub municipalities: usize,
}

/// Immutable view of the loaded records
#[derive(Debug, Default)]
pub struct GeoSnapshot {
    records: Vec<Arc<LocationRecord>>,
    municipalities: Vec<MunicipalityEntry>,
    source_files: usize,
    fingerprint: Fingerprint,
}

impl GeoSnapshot {
    /// Build a snapshot from already-normalized records, dropping duplicates
    #[must_use]
    pub fn from_records(
        records: impl IntoIterator<Item = LocationRecord>,
        municipalities: Vec<MunicipalityEntry>,
    ) -> Self {
        let mut dedupe = Deduper::new();
        let records = records
            .into_iter()
            .filter(|r| dedupe.admit(&DedupeKey::from_record(r)))
            .map(Arc::new)
            .collect();
        Self {
            records,
            municipalities,
            source_files: 0,
            fingerprint: Fingerprint::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[Arc<LocationRecord>] {
        &self.records
    }

    #[must_use]
    pub fn municipalities(&self) -> &[MunicipalityEntry] {
        &self.municipalities
    }

    /// Records within `radius_km` of `center`, nearest first
    ///
    /// Points exactly at the radius are included
    #[must_use]
    pub fn search_radius(&self, center: GeoPoint, radius_km: f64, filter: &GeoFilter) -> Vec<GeoHit> {
        let mut hits: Vec<GeoHit> = self
            .located(filter)
            .filter_map(|(record, point)| {
                let d = haversine_km(center, point);
                (d <= radius_km).then(|| GeoHit {
                    record: Arc::clone(record),
                    distance_km: Some(d),
                })
            })
            .collect();
        sort_by_distance(&mut hits);
        hits.truncate(filter.cap());
        hits
    }

    /// Records inside `bbox` (edges inclusive), in index order
    #[must_use]
    pub fn search_bbox(&self, bbox: BBox, filter: &GeoFilter) -> Vec<GeoHit> {
        self.located(filter)
            .filter(|(_, point)| bbox.contains(*point))
            .take(filter.cap())
            .map(|(record, _)| GeoHit {
                record: Arc::clone(record),
                distance_km: None,
            })
            .collect()
    }

    /// The `limit` records closest to `center`
    #[must_use]
    pub fn find_nearest(&self, center: GeoPoint, limit: usize, filter: &GeoFilter) -> Vec<GeoHit> {
        let mut hits: Vec<GeoHit> = self
            .located(filter)
            .map(|(record, point)| GeoHit {
                record: Arc::clone(record),
                distance_km: Some(haversine_km(center, point)),
            })
            .collect();
        sort_by_distance(&mut hits);
        hits.truncate(limit.min(filter.cap()));
        hits
    }

    /// Number of records passing the filter
    #[must_use]
    pub fn count(&self, filter: &GeoFilter) -> usize {
        self.records.iter().filter(|r| filter.accepts(r)).count()
    }

    /// Records passing the filter, nearest first when a center is given
    #[must_use]
    pub fn list(&self, center: Option<GeoPoint>, filter: &GeoFilter) -> Vec<GeoHit> {
        let mut hits: Vec<GeoHit> = self
            .records
            .iter()
            .filter(|r| filter.accepts(r))
            .map(|r| GeoHit {
                record: Arc::clone(r),
                distance_km: center.zip(r.geo).map(|(c, p)| haversine_km(c, p)),
            })
            .collect();
        if center.is_some() {
            sort_by_distance(&mut hits);
        }
        hits.truncate(filter.cap());
        hits
    }

    /// Fuzzy lookup of a name or address
    ///
    /// Exact match scores 1.0, containment 0.8, otherwise `0.5` times the
    /// share of search words found. Records without coordinates keep half
    /// their score. Only positive scores are returned, best first, at most
    /// ten.
    #[must_use]
    pub fn geocode(&self, text: &str) -> Vec<GeocodeHit> {
        let needle = fold(text.trim());
        if needle.is_empty() {
            return Vec::new();
        }
        let needle_words: Vec<&str> = needle.split_whitespace().collect();

        let mut hits: Vec<GeocodeHit> = self
            .records
            .iter()
            .filter_map(|record| {
                let mut score = geocode_score(record, &needle, &needle_words);
                if record.geo.is_none() {
                    score *= UNLOCATED_FACTOR;
                }
                (score > 0.0).then(|| GeocodeHit {
                    record: Arc::clone(record),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(GEOCODE_LIMIT);
        hits
    }

    /// Municipality whose name occurs in the query, longest match first
    #[must_use]
    pub fn find_municipality(&self, query: &str) -> Option<&MunicipalityEntry> {
        match_municipality(query, &self.municipalities)
    }

    #[must_use]
    pub fn stats(&self) -> GeoStats {
        let mut by_type = BTreeMap::new();
        let mut named = 0;
        for record in &self.records {
            *by_type.entry(record.doc_type.to_string()).or_insert(0) += 1;
            if record.is_named() {
                named += 1;
            }
        }
        GeoStats {
            total: self.records.len(),
            named,
            unnamed: self.records.len() - named,
            by_type,
            source_files: self.source_files,
            municipalities: self.municipalities.len(),
        }
    }

    fn located<'a>(
        &'a self,
        filter: &'a GeoFilter,
    ) -> impl Iterator<Item = (&'a Arc<LocationRecord>, GeoPoint)> + 'a {
        self.records
            .iter()
            .filter(|r| filter.accepts(r))
            .filter_map(|r| r.geo.map(|p| (r, p)))
    }
}

/// Municipality whose name occurs in the query, longest match first
///
/// Besides the full name, the part before a locative suffix counts
/// (`Feldkirchen` for `Feldkirchen in Kärnten`).
#[must_use]
pub fn match_municipality<'a>(query: &str, entries: &'a [MunicipalityEntry]) -> Option<&'a MunicipalityEntry> {
    let query = fold(query);
    entries
        .iter()
        .filter_map(|entry| {
            let name = fold(&entry.municipality);
            let short = [" in ", " am ", " an der ", " im ", " bei "]
                .iter()
                .find_map(|sep| name.split_once(sep).map(|(head, _)| head.trim().to_string()))
                .filter(|s| s.chars().count() >= MIN_MUNICIPALITY_PART);
            if contains_word(&query, &name) {
                Some((name.len(), entry))
            } else {
                short
                    .filter(|s| contains_word(&query, s))
                    .map(|s| (s.len(), entry))
            }
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, entry)| entry)
}

/// Substring match that does not start or end inside a word
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn geocode_score(record: &LocationRecord, needle: &str, needle_words: &[&str]) -> f64 {
    let mut fields: Vec<String> = vec![fold(&record.title), fold(&record.address.line())];
    if let Some(name) = &record.name {
        fields.push(fold(name));
    }
    if let Some(street) = &record.address.street {
        let house = record.address.housenumber.as_deref().unwrap_or_default();
        fields.push(fold(format!("{street} {house}").trim()));
    }
    fields.retain(|f| !f.is_empty());

    if fields.iter().any(|f| f == needle) {
        return 1.0;
    }
    if fields.iter().any(|f| f.contains(needle)) {
        return 0.8;
    }

    let matched = needle_words
        .iter()
        .filter(|w| fields.iter().any(|f| f.contains(*w)))
        .count();
    if matched == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = matched as f64 / needle_words.len() as f64;
    0.5 * ratio
}

fn sort_by_distance(hits: &mut [GeoHit]) {
    hits.sort_by(|a, b| {
        a.distance_km
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.distance_km.unwrap_or(f64::INFINITY))
    });
}

/// Geo index over the knowledge directory with mtime revalidation
pub struct GeoIndex {
    source: Arc<dyn ArtifactSource>,
    knowledge_dir: PathBuf,
    index_dir: PathBuf,
    markdown_prefix: String,
    snapshot: RwLock<Arc<GeoSnapshot>>,
}

impl std::fmt::Debug for GeoIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoIndex")
            .field("knowledge_dir", &self.knowledge_dir)
            .field("index_dir", &self.index_dir)
            .finish_non_exhaustive()
    }
}

impl GeoIndex {
    /// Create an unloaded index; the first [`Self::ensure_fresh`] loads it
    #[must_use]
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        knowledge_dir: impl Into<PathBuf>,
        index_dir: impl Into<PathBuf>,
        markdown_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source,
            knowledge_dir: knowledge_dir.into(),
            index_dir: index_dir.into(),
            markdown_prefix: markdown_prefix.into(),
            snapshot: RwLock::new(Arc::new(GeoSnapshot::default())),
        }
    }

    /// Current snapshot without revalidation
    pub async fn snapshot(&self) -> Arc<GeoSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Rebuild when any source file was added, removed or modified
    pub async fn ensure_fresh(&self) -> Arc<GeoSnapshot> {
        let files = self.source_files().await;
        let fingerprint = Fingerprint::capture(self.source.as_ref(), &files).await;

        {
            let current = self.snapshot.read().await;
            if current.fingerprint == fingerprint {
                return Arc::clone(&*current);
            }
        }

        self.rebuild(&files, fingerprint).await
    }

    /// Rebuild unconditionally
    pub async fn reload(&self) -> Arc<GeoSnapshot> {
        let files = self.source_files().await;
        let fingerprint = Fingerprint::capture(self.source.as_ref(), &files).await;
        self.rebuild(&files, fingerprint).await
    }

    async fn rebuild(&self, files: &[PathBuf], fingerprint: Fingerprint) -> Arc<GeoSnapshot> {
        let contents =
            futures::future::join_all(files.iter().map(|path| self.source.read_to_string(path))).await;

        let mut records = Vec::new();
        let mut municipalities = Vec::new();
        let mut read_files = 0;
        for (path, content) in files.iter().zip(contents) {
            match content {
                Ok(content) => {
                    read_files += 1;
                    parse_file(path, &content, &mut records, &mut municipalities);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read geo source");
                }
            }
        }

        let mut snapshot = GeoSnapshot::from_records(records, municipalities);
        snapshot.source_files = read_files;
        snapshot.fingerprint = fingerprint;

        tracing::info!(
            locations = snapshot.len(),
            municipalities = snapshot.municipalities.len(),
            files = read_files,
            "geo index loaded"
        );

        let snapshot = Arc::new(snapshot);
        *self.snapshot.write().await = Arc::clone(&snapshot);
        snapshot
    }

    /// Markdown address lists and JSONL files, sorted and without duplicates
    async fn source_files(&self) -> Vec<PathBuf> {
        let mut files = BTreeSet::new();

        for dir in [&self.knowledge_dir, &self.index_dir] {
            match self.source.list_dir(dir).await {
                Ok(entries) => {
                    files.extend(entries.into_iter().filter(|p| self.is_geo_source(p)));
                }
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "geo source directory unavailable");
                }
            }
        }

        files.into_iter().collect()
    }

    fn is_geo_source(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let in_knowledge = path.parent() == Some(self.knowledge_dir.as_path());
        let markdown = in_knowledge
            && name.starts_with(&self.markdown_prefix)
            && path.extension().is_some_and(|e| e.eq_ignore_ascii_case("md"));
        let jsonl = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("jsonl"));
        markdown || jsonl
    }
}

fn parse_file(
    path: &Path,
    content: &str,
    records: &mut Vec<LocationRecord>,
    municipalities: &mut Vec<MunicipalityEntry>,
) {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("md")) {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
        records.extend(content.lines().filter_map(|line| parse_markdown_line(line, stem)));
        return;
    }

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let origin = format!("{file_name}:{}", line_no + 1);
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "skipping malformed JSONL line");
                continue;
            }
        };
        match parse_jsonl_record(&value, &origin) {
            Ok(Ingested::Location(record)) => records.push(record),
            Ok(Ingested::Municipality(entry)) => municipalities.push(entry),
            Ok(Ingested::Skipped(doc_type)) => {
                tracing::trace!(origin = %origin, doc_type = %doc_type, "record not geo-indexed");
            }
            Err(e) => tracing::warn!(origin = %origin, error = %e, "record rejected"),
        }
    }
}
