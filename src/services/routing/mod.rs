//! Routing service for distance/time matrix calculations
//!
//! Uses OSRM or Valhalla in production, a haversine estimate for development.

mod osrm;
mod valhalla;

pub use osrm::OsrmClient;
pub use valhalla::ValhallaClient;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::services::geo::{road_distance, travel_time_seconds};
use crate::types::{Coordinates, ErrorCode, RouteGeometry};

/// Failure talking to the routing provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("routing request timed out: {0}")]
    Timeout(String),

    /// Connection failure, HTTP 429 or 5xx
    #[error("routing service unavailable: {0}")]
    Unavailable(String),

    #[error("routing service error: {0}")]
    Api(String),

    #[error("malformed routing response: {0}")]
    Malformed(String),
}

impl RoutingError {
    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RoutingError::Timeout(_) | RoutingError::Unavailable(_))
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            RoutingError::Timeout(_) => ErrorCode::RoutingServiceTimeout,
            RoutingError::Unavailable(_) => ErrorCode::RoutingServiceUnavailable,
            RoutingError::Api(_) | RoutingError::Malformed(_) => ErrorCode::RoutingServiceError,
        }
    }
}

/// Map a transport-level reqwest failure
pub(crate) fn request_error(service: &str, e: reqwest::Error) -> RoutingError {
    if e.is_timeout() {
        RoutingError::Timeout(format!("{} did not answer in time", service))
    } else if e.is_decode() {
        RoutingError::Malformed(format!("{} response could not be decoded: {}", service, e))
    } else {
        RoutingError::Unavailable(format!("{} request failed: {}", service, e))
    }
}

/// Errors for non-success HTTP statuses that carry no usable body
pub(crate) fn status_error(service: &str, status: StatusCode, body: &str) -> RoutingError {
    let body: String = body.chars().take(200).collect();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        RoutingError::Unavailable(format!("{} returned {}: {}", service, status, body))
    } else {
        RoutingError::Api(format!("{} returned {}: {}", service, status, body))
    }
}

/// Distance and duration between every pair of locations
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    /// Distance in meters [i][j] from location i to location j
    pub distances: Vec<Vec<f64>>,
    /// Duration in seconds [i][j] from location i to location j
    pub durations: Vec<Vec<f64>>,
    /// Number of locations
    pub size: usize,
}

impl DistanceMatrix {
    /// Build a matrix, rejecting non-square tables and negative or
    /// non-finite cells
    pub fn new(distances: Vec<Vec<f64>>, durations: Vec<Vec<f64>>) -> Result<Self, RoutingError> {
        let size = distances.len();
        Self::check_table("distance", &distances, size)?;
        Self::check_table("duration", &durations, size)?;

        Ok(Self {
            distances,
            durations,
            size,
        })
    }

    fn check_table(name: &str, table: &[Vec<f64>], size: usize) -> Result<(), RoutingError> {
        if table.len() != size {
            return Err(RoutingError::Malformed(format!(
                "{} table has {} rows, expected {}",
                name,
                table.len(),
                size
            )));
        }
        for (i, row) in table.iter().enumerate() {
            if row.len() != size {
                return Err(RoutingError::Malformed(format!(
                    "{} row {} has {} columns, expected {}",
                    name,
                    i,
                    row.len(),
                    size
                )));
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite() || *v < 0.0) {
                return Err(RoutingError::Malformed(format!(
                    "invalid {} {} -> {}: {}",
                    name, i, j, row[j]
                )));
            }
        }
        Ok(())
    }

    pub fn empty() -> Self {
        Self {
            distances: vec![],
            durations: vec![],
            size: 0,
        }
    }

    /// Get distance from location i to location j in meters
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from][to]
    }

    /// Get duration from location i to location j in seconds
    pub fn duration(&self, from: usize, to: usize) -> f64 {
        self.durations[from][to]
    }

    /// Fail when the provider answered for a different number of locations
    pub fn expect_size(&self, expected: usize) -> Result<(), RoutingError> {
        if self.size == expected {
            Ok(())
        } else {
            Err(RoutingError::Malformed(format!(
                "matrix covers {} locations, expected {}",
                self.size, expected
            )))
        }
    }
}

/// Convert provider rows where a cell may be missing
pub(crate) fn complete_rows(
    name: &str,
    rows: Vec<Vec<Option<f64>>>,
    scale: f64,
) -> Result<Vec<Vec<f64>>, RoutingError> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.into_iter()
                .enumerate()
                .map(|(j, cell)| {
                    cell.map(|v| v * scale).ok_or_else(|| {
                        RoutingError::Malformed(format!("no {} from location {} to {}", name, i, j))
                    })
                })
                .collect::<Result<Vec<f64>, RoutingError>>()
        })
        .collect()
}

/// Routing service trait for abstraction (OSRM, Valhalla, mock)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Get distance and duration matrix for a list of locations
    async fn get_matrix(&self, locations: &[Coordinates]) -> Result<DistanceMatrix, RoutingError>;

    /// Road geometry through `locations` in order
    async fn get_route_geometry(&self, locations: &[Coordinates]) -> Result<RouteGeometry, RoutingError> {
        Ok(RouteGeometry::from_coordinates(locations))
    }

    /// Get service name for logging
    fn name(&self) -> &'static str;
}

/// Routing implementation selected by ROUTING_BACKEND
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingBackend {
    Osrm,
    Valhalla,
    Mock,
}

impl FromStr for RoutingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "osrm" => Ok(RoutingBackend::Osrm),
            "valhalla" => Ok(RoutingBackend::Valhalla),
            "mock" => Ok(RoutingBackend::Mock),
            other => Err(format!(
                "unknown routing backend '{}' (expected osrm, valhalla or mock)",
                other
            )),
        }
    }
}

/// Mock routing service
/// Uses Haversine distance × coefficient for estimation
#[derive(Default)]
pub struct MockRoutingService;

impl MockRoutingService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn get_matrix(&self, locations: &[Coordinates]) -> Result<DistanceMatrix, RoutingError> {
        let distances = locations
            .iter()
            .map(|from| locations.iter().map(|to| road_distance(from, to)).collect())
            .collect();
        let durations = locations
            .iter()
            .map(|from| locations.iter().map(|to| travel_time_seconds(from, to)).collect())
            .collect();

        DistanceMatrix::new(distances, durations)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Create routing service based on configuration
pub fn create_routing_service(config: &Config) -> anyhow::Result<Arc<dyn RoutingService>> {
    match config.routing_backend {
        RoutingBackend::Osrm => {
            info!("Using OSRM routing at {} ({})", config.osrm_url, config.osrm_profile);
            Ok(Arc::new(OsrmClient::new(
                &config.osrm_url,
                &config.osrm_profile,
                config.routing_timeout,
            )?))
        }
        RoutingBackend::Valhalla => {
            let url = config
                .valhalla_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("VALHALLA_URL must be set when ROUTING_BACKEND=valhalla"))?;
            info!("Using Valhalla routing at {}", url);
            Ok(Arc::new(ValhallaClient::new(url, config.routing_timeout)?))
        }
        RoutingBackend::Mock => {
            info!("Using mock routing service");
            Ok(Arc::new(MockRoutingService::new()))
        }
    }
}
