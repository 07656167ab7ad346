//! Nominatim geocoding client

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::geocoding::GeocodeError;
use crate::defaults::USER_AGENT;
use crate::types::Coordinates;

/// Confidence reported when Nominatim does not return an importance score
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
    #[serde(default)]
    pub importance: Option<f64>,
}

/// A place resolved by Nominatim
#[derive(Debug, Clone, PartialEq)]
pub struct NominatimPlace {
    pub coordinates: Coordinates,
    pub confidence: f64,
    pub display_name: String,
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a new client. Nominatim rejects requests without a User-Agent.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Nominatim")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Resolve a free-text address; `Ok(None)` means the provider has no match
    pub async fn geocode(&self, address: &str) -> Result<Option<NominatimPlace>, GeocodeError> {
        let url = format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(address)
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeocodeError::Timeout
            } else {
                GeocodeError::Unavailable(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(GeocodeError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(GeocodeError::Provider(format!("HTTP {}", status)));
        }

        let results: Vec<NominatimResult> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeocodeError::Timeout
            } else {
                GeocodeError::Provider(format!("invalid response body: {}", e))
            }
        })?;

        let Some(result) = results.into_iter().next() else {
            debug!("Nominatim returned no match for '{}'", address);
            return Ok(None);
        };

        let lat: f64 = result
            .lat
            .parse()
            .map_err(|_| GeocodeError::Provider(format!("invalid latitude '{}'", result.lat)))?;
        let lng: f64 = result
            .lon
            .parse()
            .map_err(|_| GeocodeError::Provider(format!("invalid longitude '{}'", result.lon)))?;

        Ok(Some(NominatimPlace {
            coordinates: Coordinates::new(lat, lng),
            confidence: result
                .importance
                .map(|i| i.clamp(0.0, 1.0))
                .unwrap_or(DEFAULT_CONFIDENCE),
            display_name: result.display_name,
        }))
    }
}
