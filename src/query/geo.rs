//! Geo-distance query: documents within a radius of a point.

use serde_json::{Value, json};

use crate::geo::{Distance, GeoPoint};
use crate::query::field_value;

/// A geographical distance query that finds documents within a certain
/// distance of a point.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDistanceQuery {
    /// Field containing geographical coordinates
    field: String,
    /// Center point for the search
    center: GeoPoint,
    /// Maximum distance, always carrying a unit
    distance: Distance,
}

impl GeoDistanceQuery {
    /// Create a new geo distance query.
    pub fn new<F: Into<String>>(field: F, center: GeoPoint, distance: Distance) -> Self {
        GeoDistanceQuery {
            field: field.into(),
            center,
            distance,
        }
    }

    /// Get the field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Get the center point.
    pub fn center(&self) -> GeoPoint {
        self.center
    }

    /// Get the search distance.
    pub fn distance(&self) -> Distance {
        self.distance
    }

    /// Distance from the center to the document's point, if it has one.
    pub fn distance_km_to(&self, document: &Value) -> Option<f64> {
        field_value(document, &self.field)
            .and_then(geo_point_from_value)
            .map(|point| self.center.distance_to(&point))
    }

    /// Check whether a stored document lies within the radius.
    pub fn matches(&self, document: &Value) -> bool {
        self.distance_km_to(document)
            .is_some_and(|d| d <= self.distance.to_kilometers())
    }

    pub fn to_dsl(&self) -> Value {
        json!({
            "geo_distance": {
                "distance": self.distance.to_string(),
                self.field.clone(): {
                    "lat": self.center.lat,
                    "lon": self.center.lon,
                }
            }
        })
    }
}

/// Read a geo point stored as `{"lat", "lon"}`, `[lon, lat]` or `"lat,lon"`.
pub fn geo_point_from_value(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::Object(map) => {
            let lat = map.get("lat")?.as_f64()?;
            let lon = map.get("lon")?.as_f64()?;
            Some(GeoPoint::new(lat, lon))
        }
        Value::Array(items) if items.len() == 2 => {
            let lon = items[0].as_f64()?;
            let lat = items[1].as_f64()?;
            Some(GeoPoint::new(lat, lon))
        }
        Value::String(s) => {
            let (lat, lon) = s.split_once(',')?;
            let lat = lat.trim().parse().ok()?;
            let lon = lon.trim().parse().ok()?;
            Some(GeoPoint::new(lat, lon))
        }
        _ => None,
    }
}
