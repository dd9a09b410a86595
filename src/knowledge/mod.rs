//! Vector knowledge base: index artifacts, similarity search and chunk filters
//!
//! The index is produced by the ingest tooling as two positionally aligned
//! artifacts, `meta.json` (chunk metadata) and `embeddings.json` (vectors).

mod filter;
mod search;
mod store;

pub use filter::ChunkFilter;
pub use search::{ScoredIndex, SearchParams, cosine_similarity, mmr_rerank, top_k};
pub use store::{EMBEDDINGS_FILE, EmbeddingStore, IndexSnapshot, IndexedFile, META_FILE};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::geo::{Address, BBox, DocType, GeoPoint};

/// Text chunk of an ingested document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    /// File the chunk was cut from
    #[serde(rename = "fileName", alias = "sourceFile", default)]
    pub source_file: String,

    pub text: String,

    #[serde(default)]
    pub meta: ChunkMeta,
}

/// Metadata carried over from the source record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_norm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poi_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<ChunkGeo>,
}

/// Chunk location, a point and/or an extent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkGeo {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub bbox: Option<BBox>,
}

impl Chunk {
    /// Location record type, `None` for general documents
    #[must_use]
    pub fn location_type(&self) -> Option<DocType> {
        self.meta.doc_type.as_deref()?.parse().ok()
    }

    #[must_use]
    pub fn point(&self) -> Option<GeoPoint> {
        let geo = self.meta.geo.as_ref()?;
        Some(GeoPoint::new(geo.lat?, geo.lon?)).filter(GeoPoint::is_valid)
    }

    /// Municipality from the address, falling back to the city
    #[must_use]
    pub fn municipality(&self) -> Option<&str> {
        let address = self.meta.address.as_ref()?;
        address.municipality.as_deref().or(address.city.as_deref())
    }

    /// Title for source labels: metadata title, else the file name
    #[must_use]
    pub fn label(&self) -> &str {
        self.meta
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.source_file)
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "chunk id must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_numeric_id_and_meta() {
        let chunk: Chunk = serde_json::from_str(
            r#"{"id": 7, "fileName": "pois.jsonl", "text": "LKH",
                "meta": {"doc_type": "poi", "title": "LKH Feldkirchen",
                         "address": {"city": "Feldkirchen"},
                         "geo": {"lat": 46.72, "lon": 14.09}}}"#,
        )
        .unwrap();
        assert_eq!(chunk.id, "7");
        assert_eq!(chunk.location_type(), Some(DocType::Poi));
        assert_eq!(chunk.point(), Some(GeoPoint::new(46.72, 14.09)));
        assert_eq!(chunk.municipality(), Some("Feldkirchen"));
        assert_eq!(chunk.label(), "LKH Feldkirchen");
    }

    #[test]
    fn test_chunk_without_meta() {
        let chunk: Chunk =
            serde_json::from_str(r#"{"id": "a", "sourceFile": "katastrophenschutz.pdf", "text": "x"}"#)
                .unwrap();
        assert!(chunk.location_type().is_none());
        assert!(chunk.point().is_none());
        assert_eq!(chunk.label(), "katastrophenschutz.pdf");
    }
}
