//! German category vocabulary mapped onto OSM-style category norms

use crate::config::file::CategoryFileEntry;
use crate::geo::DocType;
use crate::text::fold;
use crate::{Error, Result};

/// Street name endings; tokens carrying them name a street, not a category
const STREET_SUFFIXES: &[&str] = &["strasse", "gasse", "weg", "allee"];

/// Category word with the norms it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    pub label: String,

    /// Folded word stems; a token starting with a stem matches
    pub stems: Vec<String>,

    /// Category norms such as `amenity:hospital`
    pub norms: Vec<String>,

    /// Record type the word implies, e.g. "Gebäude"
    pub doc_type: Option<DocType>,
}

impl CategoryEntry {
    fn builtin(label: &str, stems: &[&str], norms: &[&str], doc_type: Option<DocType>) -> Self {
        Self {
            label: label.to_string(),
            stems: stems.iter().map(|s| fold(s)).collect(),
            norms: norms.iter().map(ToString::to_string).collect(),
            doc_type,
        }
    }

    /// Whether a folded token names this category
    #[must_use]
    pub fn matches_token(&self, token: &str) -> bool {
        !is_street_token(token) && self.stems.iter().any(|stem| token.starts_with(stem.as_str()))
    }

    /// Whether the category can be listed on a map (points of interest or
    /// buildings, not bare addresses)
    #[must_use]
    pub fn is_listable(&self) -> bool {
        !self.norms.is_empty() || self.doc_type == Some(DocType::Building)
    }
}

impl TryFrom<CategoryFileEntry> for CategoryEntry {
    type Error = Error;

    fn try_from(entry: CategoryFileEntry) -> Result<Self> {
        let stems: Vec<String> = entry
            .stems
            .iter()
            .map(|s| fold(s.trim()))
            .filter(|s| !s.is_empty())
            .collect();
        if stems.is_empty() {
            return Err(Error::Config(format!("category {:?} has no stems", entry.label)));
        }

        let doc_type = match entry.doc_type.as_deref() {
            Some(raw) => Some(
                raw.parse::<DocType>()
                    .map_err(|()| Error::Config(format!("category {:?}: unknown doc type {raw:?}", entry.label)))?,
            ),
            None => None,
        };
        if entry.norms.is_empty() && doc_type.is_none() {
            return Err(Error::Config(format!(
                "category {:?} needs norms or a doc type",
                entry.label
            )));
        }

        Ok(Self {
            label: entry.label,
            stems,
            norms: entry.norms,
            doc_type,
        })
    }
}

/// Lookup table from query words to categories
///
/// Configured entries are consulted before the built-in vocabulary.
#[derive(Debug, Clone)]
pub struct CategoryDictionary {
    entries: Vec<CategoryEntry>,
}

impl Default for CategoryDictionary {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl CategoryDictionary {
    #[must_use]
    pub fn new(extra: Vec<CategoryEntry>) -> Self {
        let mut entries = extra;
        entries.extend(builtin_entries());
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// Categories mentioned by the given folded tokens, in dictionary order
    #[must_use]
    pub fn lookup(&self, tokens: &[String]) -> Vec<&CategoryEntry> {
        self.entries
            .iter()
            .filter(|entry| tokens.iter().any(|t| entry.matches_token(t)))
            .collect()
    }
}

/// Category norms of the given entries without duplicates
#[must_use]
pub fn collect_norms(entries: &[&CategoryEntry]) -> Vec<String> {
    let mut norms: Vec<String> = Vec::new();
    for norm in entries.iter().flat_map(|e| &e.norms) {
        if !norms.contains(norm) {
            norms.push(norm.clone());
        }
    }
    norms
}

/// Whether a folded token is a street name such as `bahnhofstrasse`
#[must_use]
pub fn is_street_token(token: &str) -> bool {
    STREET_SUFFIXES
        .iter()
        .any(|suffix| token.len() > suffix.len() && token.ends_with(suffix))
}

fn builtin_entries() -> Vec<CategoryEntry> {
    vec![
        CategoryEntry::builtin(
            "Krankenhaus",
            &["krankenh", "spital", "spitäl", "klinik", "lkh"],
            &["amenity:hospital", "amenity:clinic"],
            None,
        ),
        CategoryEntry::builtin("Feuerwehr", &["feuerwehr", "rüsthaus"], &["amenity:fire_station"], None),
        CategoryEntry::builtin("Polizei", &["polizei"], &["amenity:police"], None),
        CategoryEntry::builtin("Apotheke", &["apothek"], &["amenity:pharmacy"], None),
        CategoryEntry::builtin(
            "Rettung",
            &["rettung", "notarzt"],
            &["emergency:ambulance_station"],
            None,
        ),
        CategoryEntry::builtin("Arzt", &["arzt", "ärzt", "ordination"], &["amenity:doctors"], None),
        CategoryEntry::builtin(
            "Pflegeheim",
            &["pflegeheim", "altersheim", "altenheim", "seniorenheim"],
            &["amenity:nursing_home", "amenity:social_facility"],
            None,
        ),
        CategoryEntry::builtin(
            "Restaurant",
            &["restaurant", "gasthaus", "gasthäus", "gasthof", "gasthöf", "wirtshaus"],
            &["amenity:restaurant"],
            None,
        ),
        CategoryEntry::builtin("Café", &["cafe", "café", "kaffeehaus"], &["amenity:cafe"], None),
        CategoryEntry::builtin("Schule", &["schul"], &["amenity:school"], None),
        CategoryEntry::builtin("Kindergarten", &["kindergart", "kita"], &["amenity:kindergarten"], None),
        CategoryEntry::builtin(
            "Supermarkt",
            &["supermarkt", "lebensmittel"],
            &["shop:supermarket"],
            None,
        ),
        CategoryEntry::builtin("Tankstelle", &["tankstell"], &["amenity:fuel"], None),
        CategoryEntry::builtin(
            "Unterkunft",
            &["hotel", "pension", "unterkunft", "unterkünft"],
            &["tourism:hotel", "tourism:guest_house"],
            None,
        ),
        CategoryEntry::builtin("Kirche", &["kirche"], &["amenity:place_of_worship"], None),
        CategoryEntry::builtin("Bank", &["bank"], &["amenity:bank"], None),
        CategoryEntry::builtin("Gebäude", &["gebäude"], &[], Some(DocType::Building)),
        CategoryEntry::builtin("Adresse", &["adresse", "hausnummer"], &[], Some(DocType::Address)),
    ]
}
