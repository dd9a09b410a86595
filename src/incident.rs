//! Read-only view of the exercise's incident board

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::geo::{BBox, GeoPoint};

/// Single incident ("Einsatzstelle") on the board
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Incident {
    /// Coordinates, if present, finite, in range and not the `0,0` placeholder
    #[must_use]
    pub fn point(&self) -> Option<GeoPoint> {
        let point = GeoPoint::new(self.lat?, self.lon?);
        (point.is_valid() && point.lat != 0.0 && point.lon != 0.0).then_some(point)
    }
}

/// Incidents of the running exercise
#[derive(Debug, Clone, Default)]
pub struct IncidentBoard {
    incidents: Vec<Incident>,
}

impl IncidentBoard {
    #[must_use]
    pub const fn new(incidents: Vec<Incident>) -> Self {
        Self { incidents }
    }

    #[must_use]
    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    /// Coordinates of all located incidents
    pub fn points(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.incidents.iter().filter_map(Incident::point)
    }

    #[must_use]
    pub fn has_located_incidents(&self) -> bool {
        self.points().next().is_some()
    }

    /// Mean position of located incidents
    #[must_use]
    pub fn centroid(&self) -> Option<GeoPoint> {
        let (n, lat, lon) = self
            .points()
            .fold((0_u32, 0.0, 0.0), |(n, lat, lon), p| (n + 1, lat + p.lat, lon + p.lon));
        (n > 0).then(|| GeoPoint::new(lat / f64::from(n), lon / f64::from(n)))
    }

    /// Box covering all located incidents, padded by `padding_km`
    #[must_use]
    pub fn bbox(&self, padding_km: f64) -> Option<BBox> {
        BBox::around_points(self.points(), padding_km)
    }

    /// Parse the dashboard board document
    ///
    /// Expects `{columns: {<name>: {items: [{id, content, latitude, longitude}]}}}`;
    /// anything else yields an empty board.
    #[must_use]
    pub fn from_board_json(board: &Value) -> Self {
        let Some(columns) = board.get("columns").and_then(Value::as_object) else {
            return Self::default();
        };

        let incidents = columns
            .iter()
            .flat_map(|(column, body)| {
                body.get("items")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .map(move |item| Incident {
                        id: scalar(item.get("id")).unwrap_or_default(),
                        title: scalar(item.get("content"))
                            .or_else(|| scalar(item.get("title")))
                            .unwrap_or_default(),
                        lat: item.get("latitude").and_then(number),
                        lon: item.get("longitude").and_then(number),
                        status: Some(column.clone()),
                    })
            })
            .collect();

        Self { incidents }
    }

    /// Load a board document from disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not JSON
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&raw)?;
        Ok(Self::from_board_json(&value))
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_board_parsing() {
        let board = IncidentBoard::from_board_json(&json!({
            "columns": {
                "neu": {"items": [
                    {"id": 1, "content": "Keller überflutet", "latitude": "46.72", "longitude": 14.09},
                    {"id": 2, "content": "Ohne Ort", "latitude": 0, "longitude": 0}
                ]},
                "in-bearbeitung": {"items": [
                    {"id": "3", "content": "Baum auf Straße", "latitude": 46.74, "longitude": 14.11}
                ]}
            }
        }));
        assert_eq!(board.incidents().len(), 3);
        assert_eq!(board.points().count(), 2);
        assert!(
            board
                .incidents()
                .iter()
                .any(|i| i.id == "1" && i.status.as_deref() == Some("neu"))
        );

        let c = board.centroid().unwrap();
        assert!((c.lat - 46.73).abs() < 1e-9);
        assert!((c.lon - 14.10).abs() < 1e-9);
    }

    #[test]
    fn test_unlocated_board() {
        let board = IncidentBoard::new(vec![Incident {
            id: "x".to_string(),
            lat: Some(f64::NAN),
            lon: Some(14.0),
            ..Incident::default()
        }]);
        assert!(!board.has_located_incidents());
        assert!(board.centroid().is_none());
        assert!(board.bbox(1.0).is_none());
        assert!(IncidentBoard::from_board_json(&json!({"foo": 1})).incidents().is_empty());
    }
}
