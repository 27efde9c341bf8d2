use serde::{Deserialize, Serialize};
use std::fmt;

/// A geolocated thing whose weather we track, usually a parcel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoEntity {
    pub id: i64,
    #[serde(default, alias = "latitud")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "longitud")]
    pub longitude: Option<f64>,
    #[serde(default, alias = "ubicacion")]
    pub display_location: String,
}

impl GeoEntity {
    /// Key for weather deduplication, or `None` when the entity cannot be located
    pub fn location_key(&self, precision: u32) -> Option<LocationKey> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => LocationKey::new(lat, lon, precision),
            _ => None,
        }
    }
}

/// Coordinates rounded to a fixed number of decimals
///
/// Stored as scaled integers so that equality and hashing are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationKey {
    lat_units: i64,
    lon_units: i64,
    precision: u32,
}

impl LocationKey {
    pub fn new(latitude: f64, longitude: f64, precision: u32) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        let scale = scale(precision);
        Some(Self {
            lat_units: (latitude * scale).round() as i64,
            lon_units: (longitude * scale).round() as i64,
            precision,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.lat_units as f64 / scale(self.precision)
    }

    pub fn longitude(&self) -> f64 {
        self.lon_units as f64 / scale(self.precision)
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.precision as usize;
        write!(f, "{:.*},{:.*}", p, self.latitude(), p, self.longitude())
    }
}

fn scale(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}
