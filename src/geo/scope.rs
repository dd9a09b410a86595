//! Geographic scope of a query: whether to fence results and where the center is

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::record::MunicipalityEntry;
use super::{BBox, GeoPoint};
use crate::incident::IncidentBoard;
use crate::text::fold;

/// Phrases restricting a query to the exercise area, as `(keyword, pattern)`
/// over folded text
static LOCAL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    compile(&[
        ("im einsatzbereich", r"\bim einsatzbereich"),
        ("im einsatzgebiet", r"\bim einsatzgebiet"),
        ("innerhalb", r"innerhalb"),
        ("in der bbox", r"\bin der bbox"),
        ("nahe dem einsatz", r"\bnahe dem einsatz"),
        ("naechste", r"naechste[rns]?\b"),
        ("in der naehe", r"\bin der naehe"),
        ("umgebung", r"umgebung"),
        ("radius", r"radius"),
        ("im bereich", r"\bim bereich"),
        ("im umkreis", r"\bim umkreis"),
    ])
});

/// Phrases lifting any restriction
static GLOBAL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    compile(&[
        ("oesterreichweit", r"oesterreichweit"),
        ("bundesweit", r"bundesweit"),
        ("in kaernten", r"\bin kaernten\b"),
        ("allgemein", r"\ballgemein\b"),
        ("ausserhalb", r"ausserhalb"),
        ("nicht nur einsatzbereich", r"\bnicht nur einsatzbereich"),
        ("unabhaengig vom einsatz", r"\bunabhaengig vom einsatz"),
        ("ueberregional", r"ueberregional"),
    ])
});

fn compile(patterns: &[(&'static str, &str)]) -> Vec<(&'static str, Regex)> {
    patterns
        .iter()
        .map(|(keyword, pattern)| (*keyword, Regex::new(pattern).expect("valid regex")))
        .collect()
}

fn first_match(patterns: &[(&'static str, Regex)], folded: &str) -> Option<&'static str> {
    patterns
        .iter()
        .find(|(_, re)| re.is_match(folded))
        .map(|(keyword, _)| *keyword)
}

/// Direction of an explicit scope phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeMode {
    Local,
    Global,
}

/// Scope phrase found in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExplicitScope {
    pub mode: ScopeMode,
    pub keyword: &'static str,
}

/// Where a resolved center came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterSource {
    Query,
    Municipality,
    Incidents,
    RequestBbox,
    Fallback,
}

/// Inputs for scope resolution beyond the query text
#[derive(Debug, Clone, Copy)]
pub struct ScopeContext<'a> {
    pub incidents: &'a IncidentBoard,

    /// Bbox supplied by the caller (e.g. the map viewport)
    pub request_bbox: Option<BBox>,

    /// The query is about locations (geo intent or geo vocabulary)
    pub geo_intent: bool,

    /// Municipality mentioned in the query
    pub municipality: Option<&'a MunicipalityEntry>,

    /// Coordinates given in the query
    pub query_point: Option<GeoPoint>,
}

/// Resolved scope of one query
#[derive(Debug, Clone, Serialize)]
pub struct GeoScope {
    pub explicit: Option<ExplicitScope>,
    pub fence: Option<BBox>,
    pub center: Option<GeoPoint>,
    pub center_source: Option<CenterSource>,
    pub municipality: Option<String>,
}

/// Decides geo-fencing and center points
#[derive(Debug, Clone)]
pub struct GeoScopeResolver {
    incident_padding_km: f64,
    fallback_center: Option<GeoPoint>,
}

impl GeoScopeResolver {
    #[must_use]
    pub const fn new(incident_padding_km: f64, fallback_center: Option<GeoPoint>) -> Self {
        Self {
            incident_padding_km,
            fallback_center,
        }
    }

    /// Scope phrase in the query; local phrases are checked before global ones
    #[must_use]
    pub fn detect_explicit_scope(&self, query: &str) -> Option<ExplicitScope> {
        let folded = fold(query);
        first_match(&LOCAL_PATTERNS, &folded)
            .map(|keyword| ExplicitScope {
                mode: ScopeMode::Local,
                keyword,
            })
            .or_else(|| {
                first_match(&GLOBAL_PATTERNS, &folded).map(|keyword| ExplicitScope {
                    mode: ScopeMode::Global,
                    keyword,
                })
            })
    }

    /// Whether results should be restricted to a bounding box
    ///
    /// A global phrase disables the fence. Otherwise a local phrase, a
    /// municipality mention, a geo query, a caller bbox or located incidents
    /// enable it.
    #[must_use]
    pub fn should_apply_geo_fence(&self, query: &str, ctx: &ScopeContext<'_>) -> bool {
        match self.detect_explicit_scope(&strip_municipality(query, ctx.municipality)) {
            Some(ExplicitScope {
                mode: ScopeMode::Global,
                ..
            }) => false,
            Some(_) => true,
            None => {
                ctx.municipality.is_some()
                    || ctx.geo_intent
                    || ctx.request_bbox.is_some()
                    || ctx.incidents.has_located_incidents()
            }
        }
    }

    /// Center point: query coordinates, municipality, incident centroid,
    /// caller bbox, then the configured fallback
    #[must_use]
    pub fn resolve_center_point(&self, ctx: &ScopeContext<'_>) -> Option<(GeoPoint, CenterSource)> {
        if let Some(point) = ctx.query_point.filter(GeoPoint::is_valid) {
            return Some((point, CenterSource::Query));
        }
        if let Some(m) = ctx.municipality {
            return Some((m.bbox.center(), CenterSource::Municipality));
        }
        if let Some(centroid) = ctx.incidents.centroid() {
            return Some((centroid, CenterSource::Incidents));
        }
        if let Some(bbox) = ctx.request_bbox {
            return Some((bbox.center(), CenterSource::RequestBbox));
        }
        self.fallback_center.map(|p| (p, CenterSource::Fallback))
    }

    /// Full scope for a query
    #[must_use]
    pub fn resolve(&self, query: &str, ctx: &ScopeContext<'_>) -> GeoScope {
        let explicit = self.detect_explicit_scope(&strip_municipality(query, ctx.municipality));

        let fence = if self.should_apply_geo_fence(query, ctx) {
            ctx.municipality
                .map(|m| m.bbox)
                .or(ctx.request_bbox)
                .or_else(|| ctx.incidents.bbox(self.incident_padding_km))
        } else {
            None
        };

        let center = self.resolve_center_point(ctx);

        tracing::debug!(
            explicit = ?explicit.map(|e| e.keyword),
            fenced = fence.is_some(),
            center_source = ?center.map(|(_, s)| s),
            "resolved geo scope"
        );

        GeoScope {
            explicit,
            fence,
            center: center.map(|(p, _)| p),
            center_source: center.map(|(_, s)| s),
            municipality: ctx.municipality.map(|m| m.municipality.clone()),
        }
    }
}

/// Remove the municipality name so "Feldkirchen in Kärnten" is not read as a
/// state-wide scope
fn strip_municipality(query: &str, municipality: Option<&MunicipalityEntry>) -> String {
    let folded = fold(query);
    match municipality {
        Some(m) => folded.replace(&fold(&m.municipality), " "),
        None => folded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::Incident;

    fn resolver() -> GeoScopeResolver {
        GeoScopeResolver::new(1.0, Some(GeoPoint::new(46.7239, 14.0947)))
    }

    fn located_board() -> IncidentBoard {
        IncidentBoard::new(vec![
            Incident {
                id: "1".to_string(),
                lat: Some(46.70),
                lon: Some(14.05),
                ..Incident::default()
            },
            Incident {
                id: "2".to_string(),
                lat: Some(46.74),
                lon: Some(14.13),
                ..Incident::default()
            },
        ])
    }

    fn ctx(board: &IncidentBoard) -> ScopeContext<'_> {
        ScopeContext {
            incidents: board,
            request_bbox: None,
            geo_intent: false,
            municipality: None,
            query_point: None,
        }
    }

    #[test]
    fn test_explicit_scope_detection() {
        let r = resolver();
        assert_eq!(
            r.detect_explicit_scope("Alle Spitäler österreichweit").map(|s| s.mode),
            Some(ScopeMode::Global)
        );
        assert_eq!(
            r.detect_explicit_scope("Gebäude im Einsatzbereich").map(|s| s.mode),
            Some(ScopeMode::Local)
        );
        assert_eq!(
            r.detect_explicit_scope("Was gilt allgemein im Umkreis?").map(|s| s.mode),
            Some(ScopeMode::Local)
        );
        assert!(r.detect_explicit_scope("Wie ist das Wetter").is_none());
    }

    #[test]
    fn test_local_phrase_wins_over_region_name() {
        let r = resolver();
        let scope = r.detect_explicit_scope("Nächste Tankstelle in Kärnten").unwrap();
        assert_eq!(scope.mode, ScopeMode::Local);
        assert_eq!(scope.keyword, "naechste");

        let board = located_board();
        let resolved = r.resolve("Nächste Tankstelle in Kärnten", &ctx(&board));
        assert!(resolved.fence.is_some());
    }

    #[test]
    fn test_scope_keywords_match_whole_words() {
        let r = resolver();
        assert_eq!(
            r.detect_explicit_scope("Allgemeinmediziner in der Nähe").map(|s| s.mode),
            Some(ScopeMode::Local)
        );
        assert!(r.detect_explicit_scope("Gibt es einen Allgemeinmediziner?").is_none());
        assert!(r.detect_explicit_scope("Nächstgelegene Apotheke").is_none());
        assert_eq!(
            r.detect_explicit_scope("Was gilt allgemein?").map(|s| s.mode),
            Some(ScopeMode::Global)
        );
    }

    #[test]
    fn test_global_overrides_incidents() {
        let board = located_board();
        let scope = resolver().resolve("Welche Regeln gelten bundesweit?", &ctx(&board));
        assert!(scope.fence.is_none());
        assert_eq!(scope.center_source, Some(CenterSource::Incidents));
    }

    #[test]
    fn test_incidents_derive_fence() {
        let board = located_board();
        let scope = resolver().resolve("Welche Gefahren bestehen?", &ctx(&board));
        let fence = scope.fence.unwrap();
        assert!(fence.contains(GeoPoint::new(46.70, 14.05)));
        assert!(fence.contains(GeoPoint::new(46.74, 14.13)));
        assert!(fence.min_lat < 46.70);
    }

    #[test]
    fn test_no_context_no_fence() {
        let board = IncidentBoard::default();
        let r = resolver();
        let scope = r.resolve("Was ist ein Hochwasser?", &ctx(&board));
        assert!(scope.fence.is_none());
        assert_eq!(scope.center_source, Some(CenterSource::Fallback));

        let no_fallback = GeoScopeResolver::new(1.0, None);
        assert!(no_fallback.resolve_center_point(&ctx(&board)).is_none());
    }

    #[test]
    fn test_municipality_fence_and_center() {
        let board = located_board();
        let entry = MunicipalityEntry {
            municipality: "Feldkirchen in Kärnten".to_string(),
            bbox: BBox::new(14.0, 46.68, 14.15, 46.76),
            doc_id: "m".to_string(),
            source: "t".to_string(),
        };
        let mut c = ctx(&board);
        c.municipality = Some(&entry);
        let scope = resolver().resolve("Schulen in Feldkirchen in Kärnten", &c);
        assert_eq!(scope.fence, Some(entry.bbox));
        assert_eq!(scope.center_source, Some(CenterSource::Municipality));
        assert!(scope.explicit.is_none());
    }

    #[test]
    fn test_query_point_wins_center() {
        let board = located_board();
        let mut c = ctx(&board);
        c.query_point = Some(GeoPoint::new(46.6, 14.3));
        c.request_bbox = Some(BBox::new(14.2, 46.5, 14.4, 46.7));
        let scope = resolver().resolve("Was ist bei 46.6, 14.3?", &c);
        assert_eq!(scope.center, Some(GeoPoint::new(46.6, 14.3)));
        assert_eq!(scope.fence, c.request_bbox);
    }
}
