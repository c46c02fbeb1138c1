//! Equirectangular distances for the Swiss latitude band. Inputs are not
//! validated here; user-supplied points go through [`Coordinate::new`].

pub mod places;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use places::{Gazetteer, NamedPlace};

pub const KM_PER_DEG_LAT: f64 = 111.0;
pub const KM_PER_DEG_LNG: f64 = 85.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("coordinate is not a finite number")]
    NotFinite,
    #[error("latitude {0} outside -90..=90")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside -180..=180")]
    LongitudeOutOfRange(f64),
    #[error("invalid coordinate text: {0}")]
    Parse(String),
}

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeoError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parses `"lat,lng"` as found in share links and query strings.
    pub fn parse(text: &str) -> Result<Self, GeoError> {
        let (lat, lng) = text
            .split_once(',')
            .ok_or_else(|| GeoError::Parse(text.to_string()))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|err| GeoError::Parse(format!("{text}: {err}")))?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|err| GeoError::Parse(format!("{text}: {err}")))?;
        Self::new(lat, lng)
    }

    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dy = (lat2 - lat1) * KM_PER_DEG_LAT;
    let dx = (lng2 - lng1) * KM_PER_DEG_LNG;
    (dx * dx + dy * dy).sqrt()
}

/// Distance from a point to the segment A-B, measured in the same planar
/// projection as [`distance_km`]. The projection parameter is clamped to the
/// segment, so points past either end measure to that endpoint.
pub fn distance_to_segment(
    point_lat: f64,
    point_lng: f64,
    a_lat: f64,
    a_lng: f64,
    b_lat: f64,
    b_lng: f64,
) -> f64 {
    // Work in km relative to A so both axes share a unit.
    let px = (point_lng - a_lng) * KM_PER_DEG_LNG;
    let py = (point_lat - a_lat) * KM_PER_DEG_LAT;
    let bx = (b_lng - a_lng) * KM_PER_DEG_LNG;
    let by = (b_lat - a_lat) * KM_PER_DEG_LAT;

    let length_sq = bx * bx + by * by;
    if length_sq == 0.0 {
        return (px * px + py * py).sqrt();
    }

    let t = ((px * bx + py * by) / length_sq).clamp(0.0, 1.0);
    let dx = px - t * bx;
    let dy = py - t * by;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZURICH: (f64, f64) = (47.3769, 8.5417);
    const BERN: (f64, f64) = (46.9480, 7.4474);

    #[test]
    fn distance_is_symmetric_and_zero_on_same_point() {
        let there = distance_km(ZURICH.0, ZURICH.1, BERN.0, BERN.1);
        let back = distance_km(BERN.0, BERN.1, ZURICH.0, ZURICH.1);
        assert_eq!(there, back);
        assert_eq!(distance_km(ZURICH.0, ZURICH.1, ZURICH.0, ZURICH.1), 0.0);
        assert!(there > 90.0 && there < 110.0, "got {there}");
    }

    #[test]
    fn distance_uses_fixed_degree_lengths() {
        assert!((distance_km(46.0, 8.0, 47.0, 8.0) - 111.0).abs() < 1e-9);
        assert!((distance_km(46.0, 8.0, 46.0, 9.0) - 85.0).abs() < 1e-9);
    }

    #[test]
    fn nan_input_propagates_without_panicking() {
        assert!(distance_km(f64::NAN, 8.0, 46.0, 8.0).is_nan());
        assert!(distance_to_segment(f64::NAN, 8.0, 46.0, 8.0, 47.0, 8.0).is_nan());
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let (a_lat, a_lng) = (47.0, 8.0);
        let (b_lat, b_lng) = (47.0, 9.0);

        // Before A along the segment direction.
        let before = distance_to_segment(47.0, 7.5, a_lat, a_lng, b_lat, b_lng);
        assert!((before - distance_km(47.0, 7.5, a_lat, a_lng)).abs() < 1e-9);

        // Past B, slightly off the line.
        let after = distance_to_segment(47.1, 9.4, a_lat, a_lng, b_lat, b_lng);
        assert!((after - distance_km(47.1, 9.4, b_lat, b_lng)).abs() < 1e-9);

        // Between the ends it is the perpendicular offset.
        let middle = distance_to_segment(47.1, 8.5, a_lat, a_lng, b_lat, b_lng);
        assert!((middle - 0.1 * KM_PER_DEG_LAT).abs() < 1e-9);
    }

    #[test]
    fn degenerate_segment_measures_to_its_point() {
        let d = distance_to_segment(47.1, 8.0, 47.0, 8.0, 47.0, 8.0);
        assert!((d - distance_km(47.1, 8.0, 47.0, 8.0)).abs() < 1e-9);
    }

    #[test]
    fn coordinates_are_validated_at_the_boundary() {
        assert!(Coordinate::new(47.0, 8.0).is_ok());
        assert_eq!(
            Coordinate::new(95.0, 8.0),
            Err(GeoError::LatitudeOutOfRange(95.0))
        );
        assert_eq!(
            Coordinate::new(47.0, -181.0),
            Err(GeoError::LongitudeOutOfRange(-181.0))
        );
        assert_eq!(Coordinate::new(f64::NAN, 8.0), Err(GeoError::NotFinite));

        let parsed = Coordinate::parse(" 46.948, 7.4474 ").expect("parse pair");
        assert_eq!(parsed.latitude, 46.948);
        assert!(matches!(Coordinate::parse("bern"), Err(GeoError::Parse(_))));
    }
}
