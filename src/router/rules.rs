//! Ordered intent rules
//!
//! Each rule pairs a matcher with a parameter extractor. Rules run most
//! specific first; see [`RULES`].

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::categories::{CategoryEntry, collect_norms, is_street_token};
use super::{IntentParams, IntentType};
use crate::geo::{BBox, DocType, GeoPoint};

/// Radius used when a query only names a coordinate pair
const COORDINATE_RADIUS_KM: f64 = 1.0;

/// Coordinate pairs outside this area are read as plain numbers
const PLAUSIBLE_AREA: BBox = BBox::new(9.0, 46.0, 18.0, 49.0);

static CRITICAL_INFRA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bkritisch\w*\s+infrastruktur|\bkritis\b").expect("valid regex")
});

static BBOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(-?\d{1,3}\.\d+)\s*[,;]\s*(-?\d{1,3}\.\d+)\s*[,;]\s*(-?\d{1,3}\.\d+)\s*[,;]\s*(-?\d{1,3}\.\d+)",
    )
    .expect("valid regex")
});

pub(crate) static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d{1,2}\.\d+)\s*[,;]\s*(-?\d{1,3}\.\d+)").expect("valid regex")
});

static RADIUS_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bim (?:umkreis|radius) von (\d+(?:[.,]\d+)?)\s*(km|kilometer|m|meter)\b").expect("valid regex")
});

static RADIUS_AROUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+(?:[.,]\d+)?)\s*(km|kilometer|m|meter)\s+(rund um|um|von|entfernt)\b").expect("valid regex")
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:rund um|um|bei)\s+(.+)").expect("valid regex")
});

static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:wie ?viele|anzahl)\b").expect("valid regex"));

static NEAREST_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnaechste[nrms]?\b|\bin der naehe\b").expect("valid regex"));

static NEAREST: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\bnaechste[nrms]?\s+(.+)").expect("valid regex"),
        Regex::new(r"\bin der naehe von\s+(.+)").expect("valid regex"),
        Regex::new(r"\bnahe(?:gelegene[nrms]?)?\s+(.+)").expect("valid regex"),
    ]
});

static LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:alle|liste\w*|zeig\w*|gibt es|welche\w*|auflist\w*|aufzaehl\w*|uebersicht)\b")
        .expect("valid regex")
});

static ADDRESS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"\bwo (?:ist|liegt|befindet sich)\s+(.+)").expect("valid regex"),
        Regex::new(r"\badresse (?:von|fuer)\s+(.+)").expect("valid regex"),
        Regex::new(r"\bkoordinaten (?:von|fuer)\s+(.+)").expect("valid regex"),
        Regex::new(r"\bfinden?\s+(.+(?:strasse|weg|gasse|platz)\b.*)").expect("valid regex"),
    ]
});

static RESOURCE: LazyLock<[Regex; 6]> = LazyLock::new(|| {
    [
        Regex::new(r"\bwer hat\b").expect("valid regex"),
        Regex::new(
            r"\b(?:bagger\w*|lkws?|kran|kraene|radlader\w*|transporter\w*|fahrzeug\w*|stapler\w*|(?:strom)?aggregat\w*|pumpe\w*)\b",
        )
        .expect("valid regex"),
        Regex::new(r"\b(?:baufirm\w*|erdbau\w*|tiefbau\w*|abbruch\w*)\b").expect("valid regex"),
        Regex::new(r"\bressourcen?\s+(?:fuer|zum|zur)\b").expect("valid regex"),
        Regex::new(r"\bverfuegbar").expect("valid regex"),
        Regex::new(r"\beinsatzbereit").expect("valid regex"),
    ]
});

static RELATIONAL: LazyLock<[Regex; 6]> = LazyLock::new(|| {
    [
        Regex::new(r"\bwelche .+ sind .+ zugewiesen").expect("valid regex"),
        Regex::new(r"\bwer arbeitet an\b").expect("valid regex"),
        Regex::new(r"\bstatus von (?:einsatz|incident)").expect("valid regex"),
        Regex::new(r"\beinsatz #?(\d+)").expect("valid regex"),
        Regex::new(r"\bincident #?(\d+)").expect("valid regex"),
        Regex::new(r"\baufgaben (?:von|fuer)\s+(.+)").expect("valid regex"),
    ]
});

pub(crate) static SESSION: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"\baktuelle[rns]?\s+(?:lage|situation|status)").expect("valid regex"),
        Regex::new(r"\bwas (?:ist|war) (?:gerade|zuletzt)").expect("valid regex"),
        Regex::new(r"\bletzte[rns]?\s+(?:meldung|nachricht|update)").expect("valid regex"),
        Regex::new(r"\boffene[rns]?\s+(?:aufgaben|einsaetze|incidents)").expect("valid regex"),
    ]
});

/// Query prepared for rule matching
#[derive(Debug)]
pub(crate) struct Analysis<'a> {
    pub raw: &'a str,
    pub folded: String,
    pub tokens: Vec<String>,
    pub categories: Vec<&'a CategoryEntry>,
    pub critical_norms: &'a [String],
    pub geo_context: bool,
}

impl Analysis<'_> {
    fn has_listable_category(&self) -> bool {
        self.categories.iter().any(|c| c.is_listable())
    }

    /// Category norms and implied doc type of the mentioned categories
    fn category_params(&self) -> IntentParams {
        IntentParams {
            category_norms: collect_norms(&self.categories),
            doc_type_filter: self.categories.iter().find_map(|c| c.doc_type),
            ..IntentParams::default()
        }
    }

    fn street_token(&self) -> Option<&str> {
        self.tokens
            .iter()
            .map(String::as_str)
            .find(|t| is_street_token(t))
    }
}

/// Row of the rule table
pub(crate) struct Rule {
    pub name: &'static str,
    pub intent: IntentType,
    pub confidence: f32,
    pub extract: fn(&Analysis<'_>) -> Option<IntentParams>,
}

/// Rules in precedence order
pub(crate) const RULES: &[Rule] = &[
    Rule {
        name: "critical_infrastructure",
        intent: IntentType::GeoList,
        confidence: 0.95,
        extract: critical_infrastructure,
    },
    Rule {
        name: "bbox",
        intent: IntentType::GeoList,
        confidence: 0.95,
        extract: bbox,
    },
    Rule {
        name: "coordinates",
        intent: IntentType::GeoRadius,
        confidence: 0.95,
        extract: coordinates,
    },
    Rule {
        name: "radius",
        intent: IntentType::GeoRadius,
        confidence: 0.9,
        extract: radius,
    },
    Rule {
        name: "count",
        intent: IntentType::GeoCount,
        confidence: 0.9,
        extract: count,
    },
    Rule {
        name: "nearest_poi",
        intent: IntentType::GeoNearestPoi,
        confidence: 0.9,
        extract: nearest_poi,
    },
    Rule {
        name: "list",
        intent: IntentType::GeoList,
        confidence: 0.85,
        extract: list,
    },
    Rule {
        name: "nearest",
        intent: IntentType::GeoNearest,
        confidence: 0.85,
        extract: nearest,
    },
    Rule {
        name: "address",
        intent: IntentType::GeoAddress,
        confidence: 0.8,
        extract: address,
    },
    Rule {
        name: "resource",
        intent: IntentType::Resource,
        confidence: 0.75,
        extract: resource,
    },
    Rule {
        name: "relational",
        intent: IntentType::Relational,
        confidence: 0.8,
        extract: relational,
    },
    Rule {
        name: "hybrid",
        intent: IntentType::Hybrid,
        confidence: 0.7,
        extract: hybrid,
    },
    Rule {
        name: "session",
        intent: IntentType::Session,
        confidence: 0.7,
        extract: session,
    },
];

fn critical_infrastructure(a: &Analysis<'_>) -> Option<IntentParams> {
    CRITICAL_INFRA.is_match(&a.folded).then(|| IntentParams {
        category_norms: a.critical_norms.to_vec(),
        is_critical_infra: true,
        ..IntentParams::default()
    })
}

fn bbox(a: &Analysis<'_>) -> Option<IntentParams> {
    let caps = BBOX.captures(a.raw)?;
    let n = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
    let bbox = BBox::new(n(1)?, n(2)?, n(3)?, n(4)?);
    bbox.is_valid().then(|| IntentParams {
        bbox: Some(bbox),
        ..a.category_params()
    })
}

fn coordinates(a: &Analysis<'_>) -> Option<IntentParams> {
    let center = parse_point(a.raw)?;
    Some(IntentParams {
        center: Some(center),
        radius_km: Some(parse_radius(&a.folded).map_or(COORDINATE_RADIUS_KM, |(km, _)| km)),
        ..a.category_params()
    })
}

fn radius(a: &Analysis<'_>) -> Option<IntentParams> {
    let (km, reference) = parse_radius(&a.folded)?;
    Some(IntentParams {
        radius_km: Some(km),
        address: reference,
        ..a.category_params()
    })
}

fn count(a: &Analysis<'_>) -> Option<IntentParams> {
    if !COUNT.is_match(&a.folded) || a.categories.is_empty() {
        return None;
    }
    let mut params = a.category_params();
    if params.doc_type_filter == Some(DocType::Building)
        && let Some(street) = a.street_token()
    {
        params.doc_type_filter = Some(DocType::StreetStats);
        params.address = Some(street.to_string());
    }
    Some(params)
}

fn nearest_poi(a: &Analysis<'_>) -> Option<IntentParams> {
    if !NEAREST_WORD.is_match(&a.folded) || !a.has_listable_category() {
        return None;
    }
    Some(IntentParams {
        search_for: first_capture(NEAREST.iter(), &a.folded),
        ..a.category_params()
    })
}

fn list(a: &Analysis<'_>) -> Option<IntentParams> {
    (LIST.is_match(&a.folded) && a.has_listable_category()).then(|| a.category_params())
}

fn nearest(a: &Analysis<'_>) -> Option<IntentParams> {
    let search_for = first_capture(NEAREST.iter(), &a.folded)?;
    Some(IntentParams {
        search_for: Some(search_for),
        ..IntentParams::default()
    })
}

fn address(a: &Analysis<'_>) -> Option<IntentParams> {
    let target = first_capture(ADDRESS.iter(), &a.folded)?;
    Some(IntentParams {
        address: Some(target),
        ..IntentParams::default()
    })
}

fn resource(a: &Analysis<'_>) -> Option<IntentParams> {
    RESOURCE
        .iter()
        .any(|re| re.is_match(&a.folded))
        .then(|| IntentParams {
            search_for: Some(a.folded.trim().to_string()),
            ..IntentParams::default()
        })
}

fn relational(a: &Analysis<'_>) -> Option<IntentParams> {
    if !RELATIONAL.iter().any(|re| re.is_match(&a.folded)) {
        return None;
    }
    Some(IntentParams {
        reference: first_capture(RELATIONAL.iter(), &a.folded),
        ..IntentParams::default()
    })
}

fn hybrid(a: &Analysis<'_>) -> Option<IntentParams> {
    (is_session_query(&a.folded) && a.geo_context).then(|| a.category_params())
}

fn session(a: &Analysis<'_>) -> Option<IntentParams> {
    is_session_query(&a.folded).then(IntentParams::default)
}

pub(crate) fn is_session_query(folded: &str) -> bool {
    SESSION.iter().any(|re| re.is_match(folded))
}

/// Plausible coordinate pair in the text
pub(crate) fn parse_point(raw: &str) -> Option<GeoPoint> {
    let caps = COORDINATES.captures(raw)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lon = caps.get(2)?.as_str().parse().ok()?;
    let point = GeoPoint::new(lat, lon);
    (point.is_valid() && PLAUSIBLE_AREA.contains(point)).then_some(point)
}

/// Radius in km plus the place it is measured from, if named
fn parse_radius(folded: &str) -> Option<(f64, Option<String>)> {
    if let Some(caps) = RADIUS_PHRASE.captures(folded) {
        let km = to_km(&caps)?;
        let rest = &folded[caps.get(0)?.end()..];
        let reference = REFERENCE
            .captures(rest)
            .and_then(|c| c.get(1))
            .map(|m| clean_target(m.as_str()))
            .filter(|s| !s.is_empty());
        return Some((km, reference));
    }

    let caps = RADIUS_AROUND.captures(folded)?;
    let km = to_km(&caps)?;
    let reference = match caps.get(3).map(|m| m.as_str()) {
        Some("entfernt") | None => None,
        Some(_) => Some(clean_target(&folded[caps.get(0)?.end()..])).filter(|s| !s.is_empty()),
    };
    Some((km, reference))
}

fn to_km(caps: &Captures<'_>) -> Option<f64> {
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    match caps.get(2)?.as_str() {
        "m" | "meter" => Some(value / 1000.0),
        _ => Some(value),
    }
}

fn first_capture<'r>(mut patterns: impl Iterator<Item = &'r Regex>, text: &str) -> Option<String> {
    patterns.find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| clean_target(m.as_str()))
            .filter(|s| !s.is_empty())
    })
}

/// Strip a leading article and trailing punctuation from a captured target
fn clean_target(text: &str) -> String {
    let text = text.trim().trim_end_matches(['?', '.', '!', ' ']);
    let text = ["der ", "die ", "das ", "dem ", "den ", "des "]
        .iter()
        .find_map(|article| text.strip_prefix(article))
        .unwrap_or(text);
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_radius_units() {
        assert_eq!(parse_radius("im umkreis von 5 km"), Some((5.0, None)));
        let (km, reference) = parse_radius("alle gebaeude im umkreis von 500 m um die hauptstrasse 1?").unwrap();
        assert!((km - 0.5).abs() < f64::EPSILON);
        assert_eq!(reference.as_deref(), Some("hauptstrasse 1"));

        let (km, reference) = parse_radius("schulen 2,5 kilometer um feldkirchen").unwrap();
        assert!((km - 2.5).abs() < f64::EPSILON);
        assert_eq!(reference.as_deref(), Some("feldkirchen"));

        assert_eq!(parse_radius("300 meter entfernt"), Some((0.3, None)));
        assert!(parse_radius("5 kilogramm sand").is_none());
    }

    #[test]
    fn test_parse_point_plausibility() {
        assert_eq!(parse_point("bei 46.7239, 14.0947"), Some(GeoPoint::new(46.7239, 14.0947)));
        assert!(parse_point("Pegel 2.5, 3.1").is_none());
        assert!(parse_point("keine Zahlen").is_none());
    }

    #[test]
    fn test_clean_target() {
        assert_eq!(clean_target(" die hauptstrasse 1?! "), "hauptstrasse 1");
        assert_eq!(clean_target("lkh"), "lkh");
    }

    #[test]
    fn test_rule_table_order() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(names.first(), Some(&"critical_infrastructure"));
        assert_eq!(names.last(), Some(&"session"));
        let hybrid = names.iter().position(|n| *n == "hybrid").unwrap();
        let session = names.iter().position(|n| *n == "session").unwrap();
        assert!(hybrid < session);
        assert!(RULES.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }
}
