//! Location records and their normalization from JSONL and markdown sources

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::{BBox, GeoPoint};
use crate::embedder::floor_char_boundary;
use crate::{Error, Result};

/// Longest content kept per record
pub const MAX_CONTENT_CHARS: usize = 5000;

/// OSM tag keys consulted for the category, in priority order
const TAG_PRIORITY: &[&str] = &[
    "amenity",
    "shop",
    "craft",
    "tourism",
    "leisure",
    "office",
    "healthcare",
    "emergency",
];

/// `- **Name**: Address (lat, lon) [type]`
static NAMED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- \*\*([^*]+)\*\*:\s*([^(]+)\((-?\d+(?:\.\d+)?),\s*(-?\d+(?:\.\d+)?)\)\s*(?:\[([^\]]+)\])?")
        .expect("valid regex")
});

/// `- Address (lat, lon)`
static PLAIN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- ([^(*]+)\((-?\d+(?:\.\d+)?),\s*(-?\d+(?:\.\d+)?)\)").expect("valid regex")
});

/// Kind of location record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Address,
    Poi,
    Building,
    StreetStats,
}

impl DocType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Poi => "poi",
            Self::Building => "building",
            Self::StreetStats => "street_stats",
        }
    }

    /// German label used in rendered context
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Address => "Adresse",
            Self::Poi => "POI",
            Self::Building => "Gebäude",
            Self::StreetStats => "Straße",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = ();

    /// Accepts singular names and the plural aliases used by older exports
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_doc_type(s).as_str() {
            "address" => Ok(Self::Address),
            "poi" => Ok(Self::Poi),
            "building" => Ok(Self::Building),
            "street_stats" => Ok(Self::StreetStats),
            _ => Err(()),
        }
    }
}

/// Structured postal address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_norm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub housenumber: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
}

impl Address {
    /// Single-line rendering: the full form if present, else assembled parts
    #[must_use]
    pub fn line(&self) -> String {
        if let Some(full) = &self.full {
            return full.clone();
        }

        let mut parts = Vec::new();
        if let Some(street) = &self.street {
            parts.push(match &self.housenumber {
                Some(house) => format!("{street} {house}"),
                None => street.clone(),
            });
        }
        let city: Vec<&str> = [self.postcode.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !city.is_empty() {
            parts.push(city.join(" "));
        }
        if let Some(municipality) = &self.municipality
            && self.city.as_ref() != Some(municipality)
        {
            parts.push(municipality.clone());
        }
        parts.join(", ")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line().is_empty()
    }
}

/// Normalized address, POI, building or street record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub doc_id: String,
    pub doc_type: DocType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    pub source: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_norm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poi_class: Option<String>,
    pub content: String,

    /// Whether `doc_id` is a stable upstream identifier rather than a hash
    #[serde(skip)]
    pub stable_id: bool,
}

impl LocationRecord {
    /// Carries a proper name rather than just an address
    #[must_use]
    pub const fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Display label: the name, else the title
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.title)
    }

    /// Whether the record matches one of the category norms
    ///
    /// A norm matches the full `key:value` category or, for records without a
    /// normalized category, the bare POI class.
    #[must_use]
    pub fn matches_category(&self, norms: &[String]) -> bool {
        norms.iter().any(|norm| {
            let norm = norm.to_lowercase();
            if self.category_norm.as_deref() == Some(norm.as_str()) {
                return true;
            }
            let class = norm.split_once(':').map_or(norm.as_str(), |(_, v)| v);
            self.poi_class.as_deref() == Some(class)
        })
    }
}

/// Bounding box of a municipality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityEntry {
    pub municipality: String,
    pub bbox: BBox,
    pub doc_id: String,
    pub source: String,
}

/// Outcome of normalizing one raw record
#[derive(Debug, Clone)]
pub enum Ingested {
    Location(LocationRecord),
    Municipality(MunicipalityEntry),

    /// Valid record of a doc type the geo index does not hold
    Skipped(String),
}

/// Map plural and mixed-case doc type names onto their canonical form
#[must_use]
pub fn normalize_doc_type(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "" => "document_snippet".to_string(),
        "addresses" => "address".to_string(),
        "buildings" => "building".to_string(),
        "pois" => "poi".to_string(),
        "document_snippets" => "document_snippet".to_string(),
        _ => lower,
    }
}

/// Trim, lower-case and collapse inner whitespace
#[must_use]
pub fn normalize_street(street: &str) -> String {
    street.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Normalize one JSONL record
///
/// `origin` identifies the line (e.g. `pois.jsonl:12`) for hashing and logs.
///
/// # Errors
///
/// Returns `Error::MalformedRecord` when the value is not an object, a
/// municipality record has no usable bbox, or a location record carries
/// neither content nor usable geo nor a title to build content from
pub fn parse_jsonl_record(value: &Value, origin: &str) -> Result<Ingested> {
    let Some(obj) = value.as_object() else {
        return Err(Error::MalformedRecord(format!("{origin}: record is not an object")));
    };

    let doc_type = normalize_doc_type(&string_field(obj, "doc_type").unwrap_or_default());
    let source = string_field(obj, "source").unwrap_or_else(|| "UNKNOWN".to_string());

    if doc_type == "municipality_index" {
        return parse_municipality(obj, origin, source).map(Ingested::Municipality);
    }

    let Ok(kind) = DocType::from_str(&doc_type) else {
        return Ok(Ingested::Skipped(doc_type));
    };

    let geo_obj = obj.get("geo").and_then(Value::as_object);
    let geo = parse_point(geo_obj.unwrap_or(obj), origin);
    let bbox = geo_obj.and_then(|g| g.get("bbox")).and_then(|raw| {
        let parsed = parse_bbox(raw);
        if parsed.is_none() {
            tracing::warn!(origin, "invalid geo.bbox stripped");
        }
        parsed
    });

    let mut address = parse_address(obj);
    if let Some(street) = &address.street
        && address.street_norm.is_none()
    {
        address.street_norm = Some(normalize_street(street));
    }

    let name = string_field(obj, "name");
    let given_title = string_field(obj, "title")
        .or_else(|| name.clone())
        .or_else(|| Some(address.line()).filter(|l| !l.is_empty()));
    let explicit_content = string_field(obj, "content");
    if explicit_content.is_none() && geo.is_none() && given_title.is_none() {
        return Err(Error::MalformedRecord(format!("{origin}: no content and no usable geo")));
    }
    let title = given_title.unwrap_or_else(|| "Untitled".to_string());

    let category = string_field(obj, "category");
    let (category_norm, poi_class) = derive_category(category.as_deref(), obj.get("tags"));

    let (doc_id, stable_id) = stable_doc_id(obj, origin, &title);

    let content = explicit_content.unwrap_or_else(|| {
        fallback_content(&title, name.as_deref(), category.as_deref(), &address, geo)
    });
    let content = clamp_content(content, origin);
    if content.is_empty() {
        return Err(Error::MalformedRecord(format!("{origin}: empty content")));
    }

    Ok(Ingested::Location(LocationRecord {
        doc_id,
        doc_type: kind,
        title,
        name,
        address,
        geo,
        bbox,
        source,
        region: string_field(obj, "region").unwrap_or_else(|| "UNKNOWN".to_string()),
        category_norm,
        poi_class,
        content,
        stable_id,
    }))
}

/// Parse one line of a legacy markdown address list
///
/// Returns `None` for lines that are not address entries
#[must_use]
pub fn parse_markdown_line(line: &str, source: &str) -> Option<LocationRecord> {
    let line = line.trim();

    let (name, address, lat, lon, kind) = if let Some(caps) = NAMED_LINE.captures(line) {
        (
            Some(caps[1].trim().to_string()),
            caps[2].trim().trim_end_matches(',').trim().to_string(),
            caps[3].parse::<f64>().ok()?,
            caps[4].parse::<f64>().ok()?,
            caps.get(5).map(|m| m.as_str().trim().to_lowercase()),
        )
    } else if let Some(caps) = PLAIN_LINE.captures(line) {
        (
            None,
            caps[1].trim().trim_end_matches(',').trim().to_string(),
            caps[2].parse::<f64>().ok()?,
            caps[3].parse::<f64>().ok()?,
            None,
        )
    } else {
        return None;
    };

    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        tracing::warn!(source, line, "markdown entry with invalid coordinates skipped");
        return None;
    }

    let (category_norm, poi_class) = match kind.as_deref() {
        Some(k) if k.contains(':') => (
            Some(k.to_string()),
            k.split_once(':').map(|(_, v)| v.to_string()),
        ),
        Some(k) => (None, Some(k.to_string())),
        None => (None, None),
    };

    let title = name.clone().unwrap_or_else(|| address.clone());
    let address = Address {
        full: Some(address).filter(|a| !a.is_empty()),
        ..Address::default()
    };
    let content = fallback_content(&title, name.as_deref(), kind.as_deref(), &address, Some(point));

    Some(LocationRecord {
        doc_id: format!("md:{}", short_hash(&format!("{source}:{line}"))),
        doc_type: if name.is_some() { DocType::Poi } else { DocType::Address },
        title,
        name,
        address,
        geo: Some(point),
        bbox: None,
        source: source.to_string(),
        region: "UNKNOWN".to_string(),
        category_norm,
        poi_class,
        content,
        stable_id: false,
    })
}

fn parse_municipality(
    obj: &Map<String, Value>,
    origin: &str,
    source: String,
) -> Result<MunicipalityEntry> {
    let municipality = string_field(obj, "municipality")
        .or_else(|| {
            obj.get("address")
                .and_then(Value::as_object)
                .and_then(|a| string_field(a, "municipality"))
        })
        .or_else(|| string_field(obj, "title"))
        .ok_or_else(|| Error::MalformedRecord(format!("{origin}: municipality without name")))?;

    let bbox = obj
        .get("geo")
        .and_then(|g| g.get("bbox"))
        .and_then(parse_bbox)
        .ok_or_else(|| Error::MalformedRecord(format!("{origin}: municipality without bbox")))?;

    let (doc_id, _) = stable_doc_id(obj, origin, &municipality);
    Ok(MunicipalityEntry {
        municipality,
        bbox,
        doc_id,
        source,
    })
}

/// Read `lat`/`lon` from an object, stripping invalid values with a warning
fn parse_point(obj: &Map<String, Value>, origin: &str) -> Option<GeoPoint> {
    let lat = obj.get("lat");
    let lon = obj.get("lon");
    if lat.is_none() && lon.is_none() {
        return None;
    }

    let point = GeoPoint::new(
        lat.and_then(number_value).unwrap_or(f64::NAN),
        lon.and_then(number_value).unwrap_or(f64::NAN),
    );
    if point.is_valid() {
        Some(point)
    } else {
        tracing::warn!(origin, lat = ?lat, lon = ?lon, "invalid coordinates stripped");
        None
    }
}

fn parse_bbox(raw: &Value) -> Option<BBox> {
    let values = raw.as_array()?;
    if values.len() != 4 {
        return None;
    }
    let mut corners = [0.0; 4];
    for (slot, value) in corners.iter_mut().zip(values) {
        *slot = number_value(value)?;
    }
    Some(BBox::from(corners)).filter(BBox::is_valid)
}

fn parse_address(obj: &Map<String, Value>) -> Address {
    match obj.get("address") {
        Some(Value::Object(a)) => Address {
            street: string_field(a, "street"),
            street_norm: string_field(a, "street_norm"),
            housenumber: string_field(a, "housenumber"),
            postcode: string_field(a, "postcode"),
            city: string_field(a, "city"),
            municipality: string_field(a, "municipality"),
            full: string_field(a, "full"),
        },
        other => {
            let place = string_field(obj, "place");
            Address {
                street: string_field(obj, "street"),
                street_norm: None,
                housenumber: string_field(obj, "housenumber"),
                postcode: string_field(obj, "postcode"),
                city: place.clone(),
                municipality: place,
                full: other
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string),
            }
        }
    }
}

/// Derive `(category_norm, poi_class)` from a `key:value` category or OSM tags
fn derive_category(category: Option<&str>, tags: Option<&Value>) -> (Option<String>, Option<String>) {
    if let Some(cat) = category
        && let Some((_, value)) = cat.split_once(':')
    {
        return (Some(cat.to_lowercase()), Some(value.to_lowercase()));
    }

    if let Some(tags) = tags.and_then(Value::as_object) {
        for key in TAG_PRIORITY {
            if let Some(value) = tags.get(*key).and_then(Value::as_str)
                && !value.is_empty()
                && value != "yes"
            {
                return (
                    Some(format!("{key}:{value}").to_lowercase()),
                    Some(value.to_lowercase()),
                );
            }
        }
    }

    (category.map(str::to_lowercase), None)
}

/// Explicit `doc_id`, else an OSM identity, else a hash of origin and title
fn stable_doc_id(obj: &Map<String, Value>, origin: &str, title: &str) -> (String, bool) {
    if let Some(id) = string_field(obj, "doc_id") {
        return (id, true);
    }

    let ids = obj.get("ids").and_then(Value::as_object).unwrap_or(obj);
    if let (Some(osm_type), Some(osm_id)) = (string_field(ids, "osm_type"), string_field(ids, "osm_id")) {
        return (format!("osm:{osm_type}:{osm_id}"), true);
    }

    (format!("hash:{}", short_hash(&format!("{origin}:{title}"))), false)
}

fn fallback_content(
    title: &str,
    name: Option<&str>,
    category: Option<&str>,
    address: &Address,
    geo: Option<GeoPoint>,
) -> String {
    let mut lines = vec![title.to_string()];
    if let Some(name) = name
        && name != title
    {
        lines.push(format!("Name: {name}"));
    }
    if let Some(category) = category {
        lines.push(format!("Kategorie: {category}"));
    }
    let address_line = address.line();
    if !address_line.is_empty() && address_line != title {
        lines.push(format!("Adresse: {address_line}"));
    }
    if let Some(p) = geo {
        lines.push(format!("Koordinaten: {}, {}", p.lat, p.lon));
    }
    lines.join("\n").trim().to_string()
}

fn clamp_content(mut content: String, origin: &str) -> String {
    if content.chars().count() > MAX_CONTENT_CHARS {
        let cut = content
            .char_indices()
            .nth(MAX_CONTENT_CHARS)
            .map_or(content.len(), |(i, _)| i);
        content.truncate(floor_char_boundary(&content, cut));
        tracing::warn!(origin, max = MAX_CONTENT_CHARS, "content truncated");
    }
    content
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn location(value: &Value) -> LocationRecord {
        match parse_jsonl_record(value, "test.jsonl:1").unwrap() {
            Ingested::Location(r) => r,
            other => panic!("expected location, got {other:?}"),
        }
    }

    #[test]
    fn test_doc_type_aliases() {
        assert_eq!(DocType::from_str("Buildings"), Ok(DocType::Building));
        assert_eq!(DocType::from_str("pois"), Ok(DocType::Poi));
        assert_eq!(DocType::from_str("addresses"), Ok(DocType::Address));
        assert!(DocType::from_str("document_snippet").is_err());
    }

    #[test]
    fn test_flat_fields_promoted() {
        let r = location(&json!({
            "doc_type": "addresses",
            "lat": "46.72",
            "lon": 14.09,
            "street": "  Hauptstraße ",
            "housenumber": "1",
            "postcode": "9560",
            "place": "Feldkirchen"
        }));
        assert_eq!(r.doc_type, DocType::Address);
        assert_eq!(r.geo, Some(GeoPoint::new(46.72, 14.09)));
        assert_eq!(r.address.street_norm.as_deref(), Some("hauptstraße"));
        assert_eq!(r.address.line(), "Hauptstraße 1, 9560 Feldkirchen");
        assert_eq!(r.title, "Hauptstraße 1, 9560 Feldkirchen");
        assert!(r.content.contains("Koordinaten: 46.72, 14.09"));
        assert!(!r.stable_id);
    }

    #[test]
    fn test_invalid_geo_stripped_not_rejected() {
        let r = location(&json!({
            "doc_type": "poi",
            "title": "Rüsthaus",
            "geo": {"lat": 123.0, "lon": 14.0, "bbox": [1, 2, "x", 4]},
            "content": "Feuerwehr Rüsthaus"
        }));
        assert!(r.geo.is_none());
        assert!(r.bbox.is_none());
        assert_eq!(r.content, "Feuerwehr Rüsthaus");
    }

    #[test]
    fn test_category_from_tags() {
        let r = location(&json!({
            "doc_type": "poi",
            "name": "LKH Feldkirchen",
            "tags": {"building": "yes", "amenity": "hospital"},
            "geo": {"lat": 46.72, "lon": 14.09}
        }));
        assert_eq!(r.category_norm.as_deref(), Some("amenity:hospital"));
        assert_eq!(r.poi_class.as_deref(), Some("hospital"));
        assert!(r.matches_category(&["amenity:hospital".to_string()]));
        assert!(!r.matches_category(&["amenity:police".to_string()]));
    }

    #[test]
    fn test_category_key_value_passthrough() {
        let r = location(&json!({
            "doc_type": "poi",
            "title": "Apotheke",
            "category": "Amenity:Pharmacy",
            "content": "x"
        }));
        assert_eq!(r.category_norm.as_deref(), Some("amenity:pharmacy"));
        assert_eq!(r.poi_class.as_deref(), Some("pharmacy"));
    }

    #[test]
    fn test_doc_id_preference() {
        let r = location(&json!({"doc_type": "poi", "doc_id": "poi-1", "title": "A", "content": "a"}));
        assert_eq!(r.doc_id, "poi-1");
        assert!(r.stable_id);

        let r = location(&json!({"doc_type": "poi", "osm_type": "node", "osm_id": 42, "title": "B", "content": "b"}));
        assert_eq!(r.doc_id, "osm:node:42");

        let r = location(&json!({"doc_type": "poi", "title": "C", "content": "c"}));
        assert!(r.doc_id.starts_with("hash:"));
    }

    #[test]
    fn test_content_truncated() {
        let long = "ä".repeat(MAX_CONTENT_CHARS + 10);
        let r = location(&json!({"doc_type": "building", "title": "x", "content": long}));
        assert_eq!(r.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            parse_jsonl_record(&json!([1, 2]), "x:1"),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_record_without_content_or_geo_rejected() {
        assert!(matches!(
            parse_jsonl_record(&json!({"doc_type": "poi"}), "x:1"),
            Err(Error::MalformedRecord(_))
        ));
        assert!(matches!(
            parse_jsonl_record(&json!({"doc_type": "poi", "geo": {"lat": 123.0, "lon": 14.0}}), "x:2"),
            Err(Error::MalformedRecord(_))
        ));

        let r = location(&json!({"doc_type": "poi", "geo": {"lat": 46.72, "lon": 14.09}}));
        assert_eq!(r.title, "Untitled");
        assert!(r.content.contains("Koordinaten: 46.72, 14.09"));

        let r = location(&json!({"doc_type": "poi", "content": "Löschteich"}));
        assert!(r.geo.is_none());
        assert_eq!(r.content, "Löschteich");
    }

    #[test]
    fn test_unknown_doc_type_skipped() {
        let out = parse_jsonl_record(&json!({"doc_type": "document_snippet", "content": "x"}), "x:1").unwrap();
        assert!(matches!(out, Ingested::Skipped(t) if t == "document_snippet"));
    }

    #[test]
    fn test_municipality_record() {
        let out = parse_jsonl_record(
            &json!({
                "doc_type": "municipality_index",
                "municipality": "Feldkirchen in Kärnten",
                "geo": {"bbox": [14.0, 46.68, 14.15, 46.76]}
            }),
            "m:1",
        )
        .unwrap();
        let Ingested::Municipality(m) = out else {
            panic!("expected municipality");
        };
        assert_eq!(m.municipality, "Feldkirchen in Kärnten");
        assert!((m.bbox.max_lat - 46.76).abs() < f64::EPSILON);

        assert!(
            parse_jsonl_record(&json!({"doc_type": "municipality_index", "municipality": "X"}), "m:2")
                .is_err()
        );
    }

    #[test]
    fn test_markdown_named_line() {
        let r = parse_markdown_line(
            "- **LKH Feldkirchen**: Hauptstraße 5, 9560 Feldkirchen (46.7212, 14.0953) [hospital]",
            "adressen_feldkirchen",
        )
        .unwrap();
        assert_eq!(r.name.as_deref(), Some("LKH Feldkirchen"));
        assert_eq!(r.doc_type, DocType::Poi);
        assert_eq!(r.address.full.as_deref(), Some("Hauptstraße 5, 9560 Feldkirchen"));
        assert_eq!(r.poi_class.as_deref(), Some("hospital"));
        assert!(r.matches_category(&["amenity:hospital".to_string()]));
    }

    #[test]
    fn test_markdown_plain_line() {
        let r = parse_markdown_line("- Bahnhofstraße 3, 9560 Feldkirchen (46.72, 14.09)", "adressen_x").unwrap();
        assert!(r.name.is_none());
        assert_eq!(r.doc_type, DocType::Address);
        assert_eq!(r.title, "Bahnhofstraße 3, 9560 Feldkirchen");
        assert!(parse_markdown_line("# Adressen", "adressen_x").is_none());
        assert!(parse_markdown_line("- Irgendwo (99.0, 14.0)", "adressen_x").is_none());
    }

    #[test]
    fn test_normalize_street() {
        assert_eq!(normalize_street("  Haupt   Straße "), "haupt straße");
    }
}
