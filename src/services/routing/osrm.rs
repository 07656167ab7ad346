//! OSRM routing engine client
//!
//! Uses the Table service for matrices and the Route service for geometry.
//! See: <http://project-osrm.org/docs/v5.24.0/api/>

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{complete_rows, request_error, status_error, DistanceMatrix, RoutingError, RoutingService};
use crate::defaults::USER_AGENT;
use crate::types::{Coordinates, RouteGeometry};

const SERVICE: &str = "OSRM";

/// OSRM Table API response
#[derive(Debug, Deserialize)]
struct TableResponse {
    /// `"Ok"` on success, otherwise e.g. `"InvalidQuery"` or `"NoTable"`
    code: String,
    message: Option<String>,
    /// Meters; `None` when no route exists between a pair
    distances: Option<Vec<Vec<Option<f64>>>>,
    /// Seconds; `None` when no route exists between a pair
    durations: Option<Vec<Vec<Option<f64>>>>,
}

/// OSRM Route API response with `geometries=geojson`
#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: GeoJsonLine,
}

#[derive(Debug, Deserialize)]
struct GeoJsonLine {
    coordinates: Vec<[f64; 2]>,
}

fn api_error(code: &str, message: Option<&str>) -> RoutingError {
    RoutingError::Api(format!("{} returned {}: {}", SERVICE, code, message.unwrap_or("no message")))
}

/// OSRM routing client
pub struct OsrmClient {
    client: Client,
    base_url: String,
    profile: String,
}

impl OsrmClient {
    pub fn new(base_url: &str, profile: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for OSRM")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
        })
    }

    /// `lon,lat;lon,lat;...` path segment
    fn coordinates_path(locations: &[Coordinates]) -> String {
        locations
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";")
    }

    fn table_url(&self, locations: &[Coordinates]) -> String {
        format!(
            "{}/table/v1/{}/{}?annotations=distance,duration",
            self.base_url,
            self.profile,
            Self::coordinates_path(locations)
        )
    }

    fn route_url(&self, locations: &[Coordinates]) -> String {
        format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson",
            self.base_url,
            self.profile,
            Self::coordinates_path(locations)
        )
    }

    /// GET `url` and decode the body. OSRM answers errors such as
    /// `InvalidQuery` with HTTP 400 and a JSON body carrying the code, so the
    /// body is decoded before the status is judged.
    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, RoutingError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| request_error(SERVICE, e))?;

        match serde_json::from_str::<T>(&body) {
            Ok(parsed) if status.is_success() || status.is_client_error() => Ok(parsed),
            Ok(_) => Err(status_error(SERVICE, status, &body)),
            Err(_) if !status.is_success() => Err(status_error(SERVICE, status, &body)),
            Err(e) => Err(RoutingError::Malformed(format!("{} response: {}", SERVICE, e))),
        }
    }
}

#[async_trait]
impl RoutingService for OsrmClient {
    async fn get_matrix(&self, locations: &[Coordinates]) -> Result<DistanceMatrix, RoutingError> {
        let n = locations.len();
        if n == 0 {
            return Ok(DistanceMatrix::empty());
        }

        debug!("Requesting distance matrix from OSRM for {} locations", n);

        let table: TableResponse = self.fetch(&self.table_url(locations)).await?;
        if table.code != "Ok" {
            return Err(api_error(&table.code, table.message.as_deref()));
        }

        let distances = table
            .distances
            .ok_or_else(|| RoutingError::Malformed("OSRM response has no distances".to_string()))?;
        let durations = table
            .durations
            .ok_or_else(|| RoutingError::Malformed("OSRM response has no durations".to_string()))?;

        let matrix = DistanceMatrix::new(
            complete_rows("distance", distances, 1.0)?,
            complete_rows("duration", durations, 1.0)?,
        )?;
        matrix.expect_size(n)?;

        debug!("Received distance matrix from OSRM: {}x{}", n, n);
        Ok(matrix)
    }

    async fn get_route_geometry(&self, locations: &[Coordinates]) -> Result<RouteGeometry, RoutingError> {
        if locations.len() < 2 {
            return Ok(RouteGeometry::empty());
        }

        let response: RouteResponse = self.fetch(&self.route_url(locations)).await?;
        if response.code != "Ok" {
            return Err(api_error(&response.code, response.message.as_deref()));
        }

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoutingError::Malformed("OSRM returned no routes".to_string()))?;

        debug!("Received route geometry with {} points", route.geometry.coordinates.len());
        Ok(RouteGeometry {
            coordinates: route.geometry.coordinates,
        })
    }

    fn name(&self) -> &'static str {
        "osrm"
    }
}
