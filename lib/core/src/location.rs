//! Geographic locations and input validation.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Maximum accepted address length, in characters.
pub const MAX_ADDRESS_LEN: usize = 200;

/// Mean Earth radius used for distance calculations.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A resolved location with a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Human-readable name, usually the geocoder's formatted address.
    pub name: String,
}

impl Location {
    /// Creates a location after validating its coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCoordinates`] if either coordinate
    /// is out of range.
    pub fn new(lat: f64, lon: f64, name: impl Into<String>) -> Result<Self, ValidationError> {
        validate_coordinates(lat, lon)?;
        Ok(Self {
            lat,
            lon,
            name: name.into(),
        })
    }

    /// Great-circle distance to another location in kilometres (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Location) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Checks that `lat` is within [-90, 90] and `lon` within [-180, 180].
///
/// NaN is rejected.
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCoordinates { lat, lon })
    }
}

/// Checks an address before it is sent to the geocoder.
///
/// Returns the trimmed address.
pub fn validate_address(address: &str) -> Result<&str, ValidationError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }

    let len = trimmed.chars().count();
    if len > MAX_ADDRESS_LEN {
        return Err(ValidationError::AddressTooLong {
            len,
            max: MAX_ADDRESS_LEN,
        });
    }

    Ok(trimmed)
}
