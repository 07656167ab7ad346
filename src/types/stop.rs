//! Stop types

use serde::{Deserialize, Serialize};

/// Geographic coordinates (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid_latitude(lat: f64) -> bool {
        lat.is_finite() && (-90.0..=90.0).contains(&lat)
    }

    pub fn is_valid_longitude(lng: f64) -> bool {
        lng.is_finite() && (-180.0..=180.0).contains(&lng)
    }
}

/// A single visit location in a route request.
///
/// A stop carries either a coordinate pair, a free-text address, or both.
/// Address-only stops are filled in once by the geocoding resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    /// Address as submitted, kept once coordinates were derived from it
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub original_address: Option<String>,
    /// Whether coordinates were derived via geocoding
    #[serde(skip_deserializing)]
    pub geocoded: bool,
    /// Geocoding confidence score 0.0-1.0
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub geocoding_confidence: Option<f64>,
}

impl Stop {
    #[cfg(test)]
    pub fn from_coordinates(lat: f64, lng: f64) -> Self {
        Self {
            latitude: Some(lat),
            longitude: Some(lng),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Non-blank address, trimmed
    pub fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn needs_geocoding(&self) -> bool {
        !self.has_coordinates() && self.address().is_some()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }

    /// Fill in coordinates resolved from the stop's address
    pub fn set_geocoded_coordinates(&mut self, coordinates: Coordinates, confidence: Option<f64>) {
        self.latitude = Some(coordinates.lat);
        self.longitude = Some(coordinates.lng);
        self.geocoded = true;
        if self.original_address.is_none() {
            self.original_address = self.address.clone();
        }
        if let Some(confidence) = confidence {
            self.geocoding_confidence = Some(confidence.clamp(0.0, 1.0));
        }
    }
}
