//! Geo-spatial search over address and POI records
//!
//! Records come from JSONL knowledge files and legacy markdown address lists.
//! The index answers radius, bounding-box, nearest-neighbour and fuzzy
//! geocoding queries with linear scans over an immutable snapshot.

mod dedupe;
mod distance;
mod index;
mod record;
mod scope;

pub use dedupe::{DedupeKey, Deduper};
pub use distance::{EARTH_RADIUS_KM, format_distance, haversine_km};
pub use index::{GeoFilter, GeoHit, GeoIndex, GeoSnapshot, GeoStats, GeocodeHit, match_municipality};
pub use record::{
    Address, DocType, Ingested, LocationRecord, MunicipalityEntry, normalize_street,
    parse_jsonl_record, parse_markdown_line,
};
pub use scope::{CenterSource, ExplicitScope, GeoScope, GeoScopeResolver, ScopeContext, ScopeMode};

use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.32;

/// WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within `[-90, 90]` / `[-180, 180]`
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Bounding box, serialized as `[minLon, minLat, maxLon, maxLat]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl From<[f64; 4]> for BBox {
    fn from([min_lon, min_lat, max_lon, max_lat]: [f64; 4]) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.min_lon, b.min_lat, b.max_lon, b.max_lat]
    }
}

impl BBox {
    /// Build a box from corner values in `[minLon, minLat, maxLon, maxLat]` order
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Corners are finite, in range and ordered
    #[must_use]
    pub fn is_valid(&self) -> bool {
        GeoPoint::new(self.min_lat, self.min_lon).is_valid()
            && GeoPoint::new(self.max_lat, self.max_lon).is_valid()
            && self.min_lon <= self.max_lon
            && self.min_lat <= self.max_lat
    }

    /// Edge-inclusive containment
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    /// Whether two boxes share at least one point
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    #[must_use]
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            f64::midpoint(self.min_lat, self.max_lat),
            f64::midpoint(self.min_lon, self.max_lon),
        )
    }

    /// Smallest box covering all points, grown by `padding_km` on every side
    ///
    /// Returns `None` for an empty iterator
    #[must_use]
    pub fn around_points(points: impl IntoIterator<Item = GeoPoint>, padding_km: f64) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bbox = Self::new(first.lon, first.lat, first.lon, first.lat);
        for p in points {
            bbox.min_lon = bbox.min_lon.min(p.lon);
            bbox.max_lon = bbox.max_lon.max(p.lon);
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.max_lat = bbox.max_lat.max(p.lat);
        }
        Some(bbox.padded(padding_km))
    }

    /// Grow the box by `km` on every side, clamped to valid coordinates
    #[must_use]
    pub fn padded(&self, km: f64) -> Self {
        let dlat = km / KM_PER_DEGREE;
        let cos = self.center().lat.to_radians().cos().max(0.01);
        let dlon = km / (KM_PER_DEGREE * cos);
        Self {
            min_lon: (self.min_lon - dlon).max(-180.0),
            min_lat: (self.min_lat - dlat).max(-90.0),
            max_lon: (self.max_lon + dlon).min(180.0),
            max_lat: (self.max_lat + dlat).min(90.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_edges_inclusive() {
        let bbox = BBox::new(14.0, 46.7, 14.1, 46.8);
        assert!(bbox.contains(GeoPoint::new(46.7, 14.0)));
        assert!(bbox.contains(GeoPoint::new(46.8, 14.1)));
        assert!(!bbox.contains(GeoPoint::new(46.800_001, 14.05)));
    }

    #[test]
    fn test_bbox_serde_array() {
        let bbox: BBox = serde_json::from_str("[14.0, 46.7, 14.1, 46.8]").unwrap();
        assert!((bbox.max_lat - 46.8).abs() < f64::EPSILON);
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[14.0,46.7,14.1,46.8]");
    }

    #[test]
    fn test_around_points_padding() {
        let bbox = BBox::around_points([GeoPoint::new(46.72, 14.09)], 1.0).unwrap();
        assert!(bbox.contains(GeoPoint::new(46.72, 14.09)));
        assert!((bbox.max_lat - bbox.min_lat - 2.0 / KM_PER_DEGREE).abs() < 1e-9);
        assert!(BBox::around_points(std::iter::empty(), 1.0).is_none());
    }

    #[test]
    fn test_point_validity() {
        assert!(GeoPoint::new(46.7, 14.0).is_valid());
        assert!(!GeoPoint::new(91.0, 14.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 14.0).is_valid());
    }
}
