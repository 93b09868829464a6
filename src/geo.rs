//! Geographic primitives: points and distances.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NearbyError, Result};

/// Mean earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius used by a radius search when the caller gives none.
pub const DEFAULT_RADIUS_KM: f64 = 200.0;

/// A geographical point with latitude and longitude in degrees.
///
/// Construction does not validate ranges. Out-of-range coordinates are kept
/// as given; use [`GeoPoint::is_valid`] to check them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new geographical point.
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    /// Whether both coordinates are finite and inside their legal ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Calculate the haversine distance to another point in kilometers.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lon = (other.lon - self.lon).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

/// Unit attached to a [`Distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Kilometers,
    Meters,
}

impl DistanceUnit {
    /// The suffix the document store expects after the number.
    pub fn suffix(&self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Meters => "m",
        }
    }
}

/// A non-negative distance with an explicit unit.
///
/// The unit is always rendered, so a distance never reaches the store as a
/// bare number whose unit the store would have to guess.
///
/// ```
/// use nearby::geo::Distance;
///
/// let d: Distance = "50".parse().unwrap();
/// assert_eq!(d.to_string(), "50km");
/// assert_eq!("1500m".parse::<Distance>().unwrap().to_kilometers(), 1.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Distance {
    value: f64,
    unit: DistanceUnit,
}

impl Distance {
    /// Create a distance, rejecting negative and non-finite values.
    pub fn new(value: f64, unit: DistanceUnit) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(NearbyError::invalid_input(format!(
                "distance must be a non-negative number, got {value}"
            )));
        }
        Ok(Distance { value, unit })
    }

    /// Create a distance in kilometers.
    pub fn kilometers(value: f64) -> Result<Self> {
        Self::new(value, DistanceUnit::Kilometers)
    }

    /// Get the numeric value in this distance's own unit.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Get the unit.
    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    /// Convert to kilometers.
    pub fn to_kilometers(&self) -> f64 {
        match self.unit {
            DistanceUnit::Kilometers => self.value,
            DistanceUnit::Meters => self.value / 1000.0,
        }
    }
}

impl Default for Distance {
    fn default() -> Self {
        Distance {
            value: DEFAULT_RADIUS_KM,
            unit: DistanceUnit::Kilometers,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for Distance {
    type Err = NearbyError;

    /// Parse `"<number>km"`, `"<number>m"` or a bare number (kilometers).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (number, unit) = if let Some(n) = s.strip_suffix("km") {
            (n, DistanceUnit::Kilometers)
        } else if let Some(n) = s.strip_suffix('m') {
            (n, DistanceUnit::Meters)
        } else {
            (s, DistanceUnit::Kilometers)
        };

        let value = number
            .trim()
            .parse::<f64>()
            .map_err(|_| NearbyError::invalid_input(format!("invalid distance: {s:?}")))?;
        Distance::new(value, unit)
    }
}

impl TryFrom<String> for Distance {
    type Error = NearbyError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Distance> for String {
    fn from(value: Distance) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_points_are_kept() {
        let point = GeoPoint::new(123.0, -500.0);
        assert_eq!(point.lat, 123.0);
        assert_eq!(point.lon, -500.0);
        assert!(!point.is_valid());
        assert!(GeoPoint::new(37.77, -122.42).is_valid());
    }

    #[test]
    fn test_haversine_distance() {
        let sf = GeoPoint::new(37.7749, -122.4194);
        let la = GeoPoint::new(34.0522, -118.2437);
        let d = sf.distance_to(&la);
        assert!((d - 559.0).abs() < 2.0, "got {d}");

        assert_eq!(sf.distance_to(&sf), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        assert!((a.distance_to(&b) - 111.19).abs() < 0.01);
    }

    #[test]
    fn test_distance_parse_and_display() {
        let d: Distance = "200km".parse().unwrap();
        assert_eq!(d, Distance::default());
        assert_eq!(d.to_string(), "200km");

        let d: Distance = "50".parse().unwrap();
        assert_eq!(d.to_string(), "50km");

        let d: Distance = "750m".parse().unwrap();
        assert_eq!(d.unit(), DistanceUnit::Meters);
        assert_eq!(d.to_kilometers(), 0.75);

        let d: Distance = "2.5".parse().unwrap();
        assert_eq!(d.to_string(), "2.5km");
    }

    #[test]
    fn test_distance_rejects_garbage() {
        assert!("".parse::<Distance>().is_err());
        assert!("far".parse::<Distance>().is_err());
        assert!("-5".parse::<Distance>().is_err());
        assert!("NaN".parse::<Distance>().is_err());
        assert!(Distance::kilometers(f64::INFINITY).is_err());
    }

    #[test]
    fn test_distance_serde() {
        let d: Distance = serde_json::from_str("\"10km\"").unwrap();
        assert_eq!(d.to_kilometers(), 10.0);
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"10km\"");
    }
}
