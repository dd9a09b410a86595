//! Query intent detection
//!
//! Classifies a free-text (German) question into one of eleven intents and
//! extracts the structured parameters the retrieval paths need: centers,
//! radii, bounding boxes, category norms and address targets.

mod categories;
mod rules;

pub use categories::{CategoryDictionary, CategoryEntry, is_street_token};

use std::fmt;

use serde::Serialize;

use crate::config::RouterConfig;
use crate::geo::{BBox, DocType, GeoPoint, MunicipalityEntry, match_municipality};
use crate::text::{fold, words};
use rules::{Analysis, RULES};

/// Phrases that tie a query to a place
const GEO_WORDS: &[&str] = &[
    "naehe",
    "naechste",
    "umkreis",
    "radius",
    "umgebung",
    "entfernung",
    "adresse",
    "koordinaten",
    "einsatzbereich",
    "einsatzgebiet",
    "standort",
    "karte",
    "wo ist",
    "wo liegt",
    "wo befindet",
];

/// Retrieval path a query is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    Semantic,
    GeoRadius,
    GeoNearest,
    GeoNearestPoi,
    GeoCount,
    GeoList,
    GeoAddress,
    Resource,
    Relational,
    Session,
    Hybrid,
}

impl IntentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "SEMANTIC",
            Self::GeoRadius => "GEO_RADIUS",
            Self::GeoNearest => "GEO_NEAREST",
            Self::GeoNearestPoi => "GEO_NEAREST_POI",
            Self::GeoCount => "GEO_COUNT",
            Self::GeoList => "GEO_LIST",
            Self::GeoAddress => "GEO_ADDRESS",
            Self::Resource => "RESOURCE",
            Self::Relational => "RELATIONAL",
            Self::Session => "SESSION",
            Self::Hybrid => "HYBRID",
        }
    }

    /// Answered from the geo index alone
    #[must_use]
    pub const fn is_geo(self) -> bool {
        matches!(
            self,
            Self::GeoRadius
                | Self::GeoNearest
                | Self::GeoNearestPoi
                | Self::GeoCount
                | Self::GeoList
                | Self::GeoAddress
        )
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters extracted alongside an intent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,

    /// Point named in the query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<GeoPoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category_norms: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type_filter: Option<DocType>,

    /// Municipality named in the query, as spelled in the municipality index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,

    /// Free-text target of a "nearest" question
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_for: Option<String>,

    /// Place to geocode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Incident number or person a relational question refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_critical_infra: bool,
}

/// Classified query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub confidence: f32,

    /// Name of the rule that matched, `default` when none did
    pub pattern: &'static str,
    pub params: IntentParams,
}

impl Intent {
    /// Fallback for queries no rule recognizes
    #[must_use]
    pub fn semantic(params: IntentParams) -> Self {
        Self {
            intent_type: IntentType::Semantic,
            confidence: 0.0,
            pattern: "default",
            params,
        }
    }
}

/// Rule-based intent classifier
#[derive(Debug, Clone)]
pub struct IntentRouter {
    min_confidence: f32,
    critical_norms: Vec<String>,
    dictionary: CategoryDictionary,
    municipalities: Vec<MunicipalityEntry>,
}

impl IntentRouter {
    /// Build a router; `municipalities` feeds municipality extraction
    #[must_use]
    pub fn new(config: &RouterConfig, municipalities: Vec<MunicipalityEntry>) -> Self {
        Self {
            min_confidence: config.min_confidence,
            critical_norms: config.critical_infra_norms.clone(),
            dictionary: CategoryDictionary::new(config.extra_categories.clone()),
            municipalities,
        }
    }

    /// Same configuration with a fresh municipality table
    #[must_use]
    pub fn with_municipalities(&self, municipalities: Vec<MunicipalityEntry>) -> Self {
        Self {
            municipalities,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn dictionary(&self) -> &CategoryDictionary {
        &self.dictionary
    }

    #[must_use]
    pub fn municipalities(&self) -> &[MunicipalityEntry] {
        &self.municipalities
    }

    /// Classify a query; never fails
    ///
    /// The first rule at or above the confidence floor wins. If only weaker
    /// rules match, the most confident of them wins, earlier rules first on
    /// ties. Without any match the query is `SEMANTIC` with confidence 0.
    #[must_use]
    pub fn detect_intent(&self, query: &str) -> Intent {
        let analysis = self.analyze(query);

        let mut weak: Option<(&rules::Rule, IntentParams)> = None;
        let mut chosen = None;
        for rule in RULES {
            let Some(params) = (rule.extract)(&analysis) else {
                continue;
            };
            if rule.confidence >= self.min_confidence {
                chosen = Some((rule, params));
                break;
            }
            if weak
                .as_ref()
                .is_none_or(|(best, _)| rule.confidence > best.confidence)
            {
                weak = Some((rule, params));
            }
        }

        let municipality = match_municipality(query, &self.municipalities).map(|m| m.municipality.clone());
        let intent = match chosen.or(weak) {
            Some((rule, params)) => Intent {
                intent_type: rule.intent,
                confidence: rule.confidence,
                pattern: rule.name,
                params: IntentParams {
                    municipality,
                    ..params
                },
            },
            None => Intent::semantic(IntentParams {
                municipality,
                ..IntentParams::default()
            }),
        };

        tracing::debug!(
            intent = %intent.intent_type,
            confidence = intent.confidence,
            pattern = intent.pattern,
            "intent detected"
        );
        intent
    }

    /// Whether the query refers to a place: geo vocabulary, a street, a
    /// mappable category, coordinates or a known municipality
    #[must_use]
    pub fn has_geo_context(&self, query: &str) -> bool {
        self.analyze(query).geo_context
    }

    fn analyze<'a>(&'a self, query: &'a str) -> Analysis<'a> {
        let folded = fold(query);
        let tokens = words(query);
        let categories = self.dictionary.lookup(&tokens);

        let geo_context = GEO_WORDS.iter().any(|w| folded.contains(w))
            || tokens.iter().any(|t| is_street_token(t))
            || categories.iter().any(|c| c.is_listable())
            || rules::parse_point(query).is_some()
            || match_municipality(query, &self.municipalities).is_some();

        Analysis {
            raw: query,
            folded,
            tokens,
            categories,
            critical_norms: &self.critical_norms,
            geo_context,
        }
    }
}
