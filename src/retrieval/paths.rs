//! Per-store retrieval paths producing rendered entries

use super::assemble::{Entry, Section};
use super::{Source, SourceGroup};
use crate::config::{GeoConfig, RagConfig};
use crate::geo::{
    DocType, GeoFilter, GeoHit, GeoPoint, GeoScope, GeoSnapshot, ScopeMode, format_distance, haversine_km,
    match_municipality,
};
use crate::knowledge::{ChunkFilter, IndexSnapshot, SearchParams};
use crate::router::{Intent, IntentParams, IntentType};
use crate::session::SessionHit;
use crate::text::{fold, preview, truncate_at_sentence};

/// Characters of record or chunk text kept in a source preview
const PREVIEW_CHARS: usize = 160;

pub(crate) const NO_GEO_RESULTS: &str = "Keine geografischen Ergebnisse gefunden.";
pub(crate) const NO_SESSION_RESULTS: &str = "Keine relevanten Session-Daten gefunden.";

pub(crate) const KNOWLEDGE_TITLE: &str = "FACHWISSEN";
pub(crate) const RESOURCE_TITLE: &str = "RESSOURCEN";
pub(crate) const SESSION_TITLE: &str = "AKTUELLE EINSATZDATEN";
pub(crate) const HYBRID_TITLE: &str = "KOMBINIERTE ERGEBNISSE";

/// Geo section for a `GEO_*` intent; never empty
pub(crate) fn geo_section(geo: &GeoSnapshot, intent: &Intent, scope: &GeoScope, config: &GeoConfig) -> Section {
    let params = &intent.params;
    let (title, mut entries) = match intent.intent_type {
        IntentType::GeoRadius => radius(geo, params, scope, config),
        IntentType::GeoNearest => nearest_named(geo, params, scope, config),
        IntentType::GeoNearestPoi => nearest_poi(geo, params, scope, config),
        IntentType::GeoCount => count(geo, params, scope),
        IntentType::GeoAddress => address(geo, params, scope),
        _ => list(geo, params, scope, config),
    };
    if entries.is_empty() {
        entries.push(Entry::note(SourceGroup::Geo, NO_GEO_RESULTS));
    }
    Section::new(title, entries)
}

/// Geo part of a hybrid query: matching categories near the center, else
/// named places around it
pub(crate) fn hybrid_geo_entries(
    geo: &GeoSnapshot,
    params: &IntentParams,
    scope: &GeoScope,
    config: &GeoConfig,
) -> Vec<Entry> {
    let center = params.center.or(scope.center);
    if !params.category_norms.is_empty() || params.doc_type_filter.is_some() {
        let filter = base_filter(params).within(scope.fence).limit(config.nearest_limit);
        return geo
            .list(center, &filter)
            .iter()
            .map(|hit| geo_entry(hit, hit.distance_km.map_or(1.0, nearness)))
            .collect();
    }

    let Some(center) = center else {
        return Vec::new();
    };
    let radius_km = params.radius_km.unwrap_or(config.default_radius_km);
    let filter = GeoFilter::new()
        .named_only()
        .within(scope.fence)
        .limit(config.nearest_limit);
    geo.search_radius(center, radius_km, &filter)
        .iter()
        .map(|hit| geo_entry(hit, within_radius(hit.distance_km, radius_km)))
        .collect()
}

/// Vector search restricted by the query's municipality and fence
pub(crate) fn knowledge_filter(params: &IntentParams, scope: &GeoScope, config: &GeoConfig) -> ChunkFilter {
    ChunkFilter {
        municipality: params.municipality.clone(),
        fence: scope.fence,
        fence_doc_types: config.fence_doc_types.clone(),
        municipality_or_fence: params.municipality.is_some(),
        ..ChunkFilter::none()
    }
}

/// Most similar chunks, capped at `rag.max_context_chars` in total
pub(crate) fn knowledge_entries(
    index: &IndexSnapshot,
    query: &[f32],
    filter: &ChunkFilter,
    rag: &RagConfig,
) -> Vec<Entry> {
    let params = SearchParams {
        top_k: rag.top_k,
        threshold: rag.score_threshold,
        mmr_lambda: rag.mmr_lambda,
        mmr_pool_factor: rag.mmr_pool_factor,
    };

    let mut used = 0;
    let mut entries = Vec::new();
    for hit in index.search(query, filter, &params) {
        let Some(chunk) = index.chunk(hit.index) else {
            continue;
        };
        let text = truncate_at_sentence(chunk.text.trim(), rag.max_context_chars.saturating_sub(used));
        if text.is_empty() {
            break;
        }
        used += text.chars().count();

        let score = hit.score.clamp(0.0, 1.0);
        let label = chunk.label();
        entries.push(Entry {
            group: SourceGroup::Knowledge,
            text: format!("[{label}] {text}"),
            score,
            source: Some(Source {
                group: SourceGroup::Knowledge,
                label: label.to_string(),
                score,
                preview: preview(&chunk.text, PREVIEW_CHARS),
            }),
        });
    }
    entries
}

pub(crate) fn session_entries(hits: Vec<SessionHit>) -> Vec<Entry> {
    hits.into_iter()
        .map(|hit| {
            let kind = hit.meta.kind.as_deref().unwrap_or("info");
            let score = hit.score.clamp(0.0, 1.0);
            Entry {
                group: SourceGroup::Session,
                text: format!("- [{kind}] {}", hit.text),
                score,
                source: Some(Source {
                    group: SourceGroup::Session,
                    label: hit.id,
                    score,
                    preview: preview(&hit.text, PREVIEW_CHARS),
                }),
            }
        })
        .collect()
}

fn radius(geo: &GeoSnapshot, params: &IntentParams, scope: &GeoScope, config: &GeoConfig) -> (String, Vec<Entry>) {
    let radius_km = params.radius_km.unwrap_or(config.default_radius_km);
    let title = format!("UMKREIS {}", format_distance(radius_km));
    let Some((center, explicit)) = radius_center(geo, params, scope) else {
        return (title, Vec::new());
    };

    // an explicit center is not fenced by the exercise area
    let fence = if explicit { None } else { scope.fence };
    let filter = base_filter(params).within(fence).limit(config.radius_limit);
    let entries = geo
        .search_radius(center, radius_km, &filter)
        .iter()
        .map(|hit| geo_entry(hit, within_radius(hit.distance_km, radius_km)))
        .collect();
    (title, entries)
}

/// Query point, else the named place, else the scope center; the flag tells
/// whether the center came from the query itself
fn radius_center(geo: &GeoSnapshot, params: &IntentParams, scope: &GeoScope) -> Option<(GeoPoint, bool)> {
    if let Some(point) = params.center {
        return Some((point, true));
    }
    if let Some(place) = params.address.as_deref() {
        if let Some(municipality) = match_municipality(place, geo.municipalities()) {
            return Some((municipality.bbox.center(), true));
        }
        if let Some(point) = geo.geocode(place).into_iter().find_map(|hit| hit.record.geo) {
            return Some((point, true));
        }
    }
    scope.center.map(|point| (point, false))
}

fn nearest_poi(
    geo: &GeoSnapshot,
    params: &IntentParams,
    scope: &GeoScope,
    config: &GeoConfig,
) -> (String, Vec<Entry>) {
    let title = "NÄCHSTGELEGENE EINRICHTUNGEN".to_string();
    let Some(center) = params.center.or(scope.center) else {
        return (title, Vec::new());
    };
    let filter = base_filter(params).within(strict_fence(scope));
    let entries = geo
        .find_nearest(center, config.nearest_limit, &filter)
        .iter()
        .map(|hit| geo_entry(hit, hit.distance_km.map_or(0.0, nearness)))
        .collect();
    (title, entries)
}

/// Places whose name matches the search target, nearest first; falls back to
/// the nearest named places when nothing matches
fn nearest_named(
    geo: &GeoSnapshot,
    params: &IntentParams,
    scope: &GeoScope,
    config: &GeoConfig,
) -> (String, Vec<Entry>) {
    let title = "NÄCHSTGELEGENE ORTE".to_string();
    let center = params.center.or(scope.center);
    let fence = strict_fence(scope);

    let mut hits: Vec<GeoHit> = params
        .search_for
        .as_deref()
        .map(|target| geo.geocode(target))
        .unwrap_or_default()
        .into_iter()
        .filter(|hit| fence.is_none_or(|f| hit.record.geo.is_some_and(|p| f.contains(p))))
        .map(|hit| GeoHit {
            distance_km: center.zip(hit.record.geo).map(|(c, p)| haversine_km(c, p)),
            record: hit.record,
        })
        .collect();
    if center.is_some() {
        hits.sort_by(|a, b| {
            a.distance_km
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.distance_km.unwrap_or(f64::INFINITY))
        });
    }
    hits.truncate(config.nearest_limit);

    if hits.is_empty()
        && let Some(center) = center
    {
        let filter = GeoFilter::new().named_only().within(fence);
        hits = geo.find_nearest(center, config.nearest_limit, &filter);
    }

    let entries = hits
        .iter()
        .map(|hit| geo_entry(hit, hit.distance_km.map_or(0.0, nearness)))
        .collect();
    (title, entries)
}

fn count(geo: &GeoSnapshot, params: &IntentParams, scope: &GeoScope) -> (String, Vec<Entry>) {
    if params.doc_type_filter == Some(DocType::StreetStats)
        && let Some(street) = params.address.as_deref()
    {
        return street_stats(geo, street);
    }

    let filter = base_filter(params).within(scope.fence);
    let n = geo.count(&filter);
    let place = match (&scope.municipality, scope.fence) {
        (Some(municipality), _) => format!(" in {municipality}"),
        (None, Some(_)) => " im Einsatzbereich".to_string(),
        (None, None) => String::new(),
    };
    let subject = count_subject(params);
    let line = format!("Anzahl {subject}{place}: {n}");
    ("ANZAHL".to_string(), vec![summary_entry(format!("Anzahl {subject}"), line)])
}

/// Building count of one street plus its street statistics records
fn street_stats(geo: &GeoSnapshot, street: &str) -> (String, Vec<Entry>) {
    let needle = fold(street);
    let on_street = |record_street: Option<&str>| record_street.is_some_and(|s| fold(s) == needle);

    let buildings = geo
        .records()
        .iter()
        .filter(|r| r.doc_type == DocType::Building && on_street(r.address.street.as_deref()))
        .count();
    let stats: Vec<Entry> = geo
        .records()
        .iter()
        .filter(|r| {
            r.doc_type == DocType::StreetStats
                && (on_street(r.address.street.as_deref()) || fold(&r.title).contains(&needle))
        })
        .map(|r| {
            let hit = GeoHit {
                record: std::sync::Arc::clone(r),
                distance_km: None,
            };
            let mut entry = geo_entry(&hit, 1.0);
            entry.text = format!("- {}", r.content.trim());
            entry
        })
        .collect();

    let display = geo
        .records()
        .iter()
        .find_map(|r| r.address.street.as_deref().filter(|s| fold(s) == needle))
        .unwrap_or(street);
    let line = format!("Gebäude in {display}: {buildings}");

    let mut entries = vec![summary_entry(format!("Gebäude {display}"), line)];
    entries.extend(stats);
    ("STRASSENSTATISTIK".to_string(), entries)
}

fn list(geo: &GeoSnapshot, params: &IntentParams, scope: &GeoScope, config: &GeoConfig) -> (String, Vec<Entry>) {
    let title = if params.is_critical_infra {
        "KRITISCHE INFRASTRUKTUR"
    } else {
        "GEOGRAFISCHE ERGEBNISSE"
    };
    let fence = params.bbox.or(scope.fence);
    let center = params.center.or(scope.center);
    let filter = base_filter(params).within(fence).limit(config.bbox_limit);
    let entries = geo.list(center, &filter).iter().map(|hit| geo_entry(hit, 1.0)).collect();
    (title.to_string(), entries)
}

fn address(geo: &GeoSnapshot, params: &IntentParams, scope: &GeoScope) -> (String, Vec<Entry>) {
    let title = "ADRESSSUCHE".to_string();
    let Some(target) = params.address.as_deref() else {
        return (title, Vec::new());
    };
    let fence = strict_fence(scope);
    let entries = geo
        .geocode(target)
        .into_iter()
        .filter(|hit| fence.is_none_or(|f| hit.record.geo.is_some_and(|p| f.contains(p))))
        .map(|hit| {
            #[allow(clippy::cast_possible_truncation)]
            let score = hit.score.clamp(0.0, 1.0) as f32;
            geo_entry(
                &GeoHit {
                    record: hit.record,
                    distance_km: None,
                },
                score,
            )
        })
        .collect();
    (title, entries)
}

fn base_filter(params: &IntentParams) -> GeoFilter {
    GeoFilter::new()
        .categories(&params.category_norms)
        .doc_types(params.doc_type_filter)
}

/// Fence for proximity lookups: only a named municipality or an explicit
/// local phrase restricts them
fn strict_fence(scope: &GeoScope) -> Option<crate::geo::BBox> {
    let restricted =
        scope.municipality.is_some() || scope.explicit.is_some_and(|e| e.mode == ScopeMode::Local);
    scope.fence.filter(|_| restricted)
}

fn count_subject(params: &IntentParams) -> String {
    if !params.category_norms.is_empty() {
        let kinds: Vec<&str> = params
            .category_norms
            .iter()
            .map(|n| n.split_once(':').map_or(n.as_str(), |(_, v)| v))
            .collect();
        return kinds.join("/");
    }
    params
        .doc_type_filter
        .map_or_else(|| "Einträge".to_string(), |t| t.label().to_string())
}

fn summary_entry(label: String, line: String) -> Entry {
    Entry {
        group: SourceGroup::Geo,
        source: Some(Source {
            group: SourceGroup::Geo,
            label,
            score: 1.0,
            preview: line.clone(),
        }),
        text: line,
        score: 1.0,
    }
}

/// `- **Name**: address (distance) [type]` plus a coordinates line
fn geo_entry(hit: &GeoHit, score: f32) -> Entry {
    let record = &hit.record;
    let mut line = String::from("- ");
    if let Some(name) = &record.name {
        line.push_str(&format!("**{name}**: "));
    }
    let address = record.address.line();
    line.push_str(if address.is_empty() { &record.title } else { &address });
    if let Some(d) = hit.distance_km {
        line.push_str(&format!(" ({})", format_distance(d)));
    }
    let kind = record.poi_class.as_deref().unwrap_or(record.doc_type.label());
    line.push_str(&format!(" [{kind}]"));
    if let Some(point) = record.geo {
        line.push_str(&format!("\n  Koordinaten: {:.5}, {:.5}", point.lat, point.lon));
    }

    Entry {
        group: SourceGroup::Geo,
        text: line,
        score,
        source: Some(Source {
            group: SourceGroup::Geo,
            label: record.label().to_string(),
            score,
            preview: preview(&record.content, PREVIEW_CHARS),
        }),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn nearness(distance_km: f64) -> f32 {
    (1.0 / (1.0 + distance_km.max(0.0))) as f32
}

#[allow(clippy::cast_possible_truncation)]
fn within_radius(distance_km: Option<f64>, radius_km: f64) -> f32 {
    match distance_km {
        Some(d) if radius_km > 0.0 => (1.0 - d / radius_km).clamp(0.0, 1.0) as f32,
        Some(_) => 1.0,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Address, BBox, ExplicitScope, LocationRecord, MunicipalityEntry};

    fn record(id: &str, doc_type: DocType, name: Option<&str>, street: &str, lat: f64, lon: f64) -> LocationRecord {
        LocationRecord {
            doc_id: id.to_string(),
            doc_type,
            title: name.unwrap_or(street).to_string(),
            name: name.map(ToString::to_string),
            address: Address {
                street: Some(street.to_string()),
                city: Some("Feldkirchen".to_string()),
                ..Address::default()
            },
            geo: Some(GeoPoint::new(lat, lon)),
            bbox: None,
            source: "test".to_string(),
            region: "UNKNOWN".to_string(),
            category_norm: None,
            poi_class: None,
            content: format!("{} {street}", name.unwrap_or("")),
            stable_id: true,
        }
    }

    fn hospital(id: &str, name: &str, lat: f64, lon: f64) -> LocationRecord {
        LocationRecord {
            category_norm: Some("amenity:hospital".to_string()),
            poi_class: Some("hospital".to_string()),
            ..record(id, DocType::Poi, Some(name), "Hauptstraße", lat, lon)
        }
    }

    fn snapshot() -> GeoSnapshot {
        GeoSnapshot::from_records(
            vec![
                hospital("h1", "LKH Feldkirchen", 46.7230, 14.0950),
                hospital("h2", "Klinikum Klagenfurt", 46.6250, 14.3050),
                record("b1", DocType::Building, None, "Bahnhofstraße", 46.7240, 14.0960),
                record("b2", DocType::Building, None, "Bahnhofstraße", 46.7242, 14.0962),
                record("a1", DocType::Address, None, "10.-Oktober-Straße", 46.7250, 14.0930),
            ],
            vec![MunicipalityEntry {
                municipality: "Feldkirchen in Kärnten".to_string(),
                bbox: BBox::new(14.05, 46.70, 14.15, 46.75),
                doc_id: "m1".to_string(),
                source: "test".to_string(),
            }],
        )
    }

    fn scope(center: Option<GeoPoint>, fence: Option<BBox>) -> GeoScope {
        GeoScope {
            explicit: None,
            fence,
            center,
            center_source: None,
            municipality: None,
        }
    }

    fn intent(intent_type: IntentType, params: IntentParams) -> Intent {
        Intent {
            intent_type,
            confidence: 0.9,
            pattern: "test",
            params,
        }
    }

    #[test]
    fn test_nearest_poi_ignores_implicit_fence() {
        let params = IntentParams {
            category_norms: vec!["amenity:hospital".to_string()],
            ..IntentParams::default()
        };
        let fence = BBox::new(14.0, 46.7, 14.2, 46.8);
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoNearestPoi, params.clone()),
            &scope(Some(GeoPoint::new(46.6250, 14.3040)), Some(fence)),
            &GeoConfig::default(),
        );
        assert!(section.entries[0].text.starts_with("- **Klinikum Klagenfurt**"));
        assert!(section.entries[0].score > section.entries[1].score);

        let mut local = scope(Some(GeoPoint::new(46.6250, 14.3040)), Some(fence));
        local.explicit = Some(ExplicitScope {
            mode: ScopeMode::Local,
            keyword: "im einsatzbereich",
        });
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoNearestPoi, params),
            &local,
            &GeoConfig::default(),
        );
        assert_eq!(section.entries.len(), 1);
        assert!(section.entries[0].text.contains("LKH Feldkirchen"));
    }

    #[test]
    fn test_geo_line_format() {
        let params = IntentParams {
            category_norms: vec!["amenity:hospital".to_string()],
            ..IntentParams::default()
        };
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoNearestPoi, params),
            &scope(Some(GeoPoint::new(46.7230, 14.0950)), None),
            &GeoConfig::default(),
        );
        assert_eq!(
            section.entries[0].text,
            "- **LKH Feldkirchen**: Hauptstraße, Feldkirchen (0 m) [hospital]\n  Koordinaten: 46.72300, 14.09500"
        );
        assert!((section.entries[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_count_zero_is_rendered() {
        let params = IntentParams {
            category_norms: vec!["amenity:pharmacy".to_string()],
            ..IntentParams::default()
        };
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoCount, params),
            &scope(None, None),
            &GeoConfig::default(),
        );
        assert_eq!(section.entries.len(), 1);
        assert_eq!(section.entries[0].text, "Anzahl pharmacy: 0");
        assert!(section.entries[0].source.is_some());
    }

    #[test]
    fn test_street_building_count() {
        let params = IntentParams {
            doc_type_filter: Some(DocType::StreetStats),
            address: Some("bahnhofstrasse".to_string()),
            ..IntentParams::default()
        };
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoCount, params),
            &scope(None, None),
            &GeoConfig::default(),
        );
        assert_eq!(section.entries[0].text, "Gebäude in Bahnhofstraße: 2");
    }

    #[test]
    fn test_radius_scores_fall_with_distance() {
        let params = IntentParams {
            center: Some(GeoPoint::new(46.7240, 14.0960)),
            radius_km: Some(1.0),
            ..IntentParams::default()
        };
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoRadius, params),
            &scope(None, None),
            &GeoConfig::default(),
        );
        assert_eq!(section.title, "UMKREIS 1.0 km");
        assert_eq!(section.entries.len(), 4);
        let scores: Vec<f32> = section.entries.iter().map(|e| e.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_radius_around_municipality() {
        let params = IntentParams {
            address: Some("Feldkirchen".to_string()),
            radius_km: Some(0.5),
            ..IntentParams::default()
        };
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoRadius, params),
            &scope(None, None),
            &GeoConfig::default(),
        );
        assert!(section.entries.iter().all(|e| e.source.is_some()));
    }

    #[test]
    fn test_empty_geo_result_note() {
        let params = IntentParams {
            address: Some("Mondbasis".to_string()),
            ..IntentParams::default()
        };
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoAddress, params),
            &scope(None, None),
            &GeoConfig::default(),
        );
        assert_eq!(section.entries.len(), 1);
        assert_eq!(section.entries[0].text, NO_GEO_RESULTS);
        assert!(section.entries[0].source.is_none());
    }

    #[test]
    fn test_list_respects_fence() {
        let params = IntentParams {
            category_norms: vec!["amenity:hospital".to_string()],
            is_critical_infra: true,
            ..IntentParams::default()
        };
        let section = geo_section(
            &snapshot(),
            &intent(IntentType::GeoList, params),
            &scope(None, Some(BBox::new(14.0, 46.7, 14.2, 46.8))),
            &GeoConfig::default(),
        );
        assert_eq!(section.title, "KRITISCHE INFRASTRUKTUR");
        assert_eq!(section.entries.len(), 1);
    }
}
