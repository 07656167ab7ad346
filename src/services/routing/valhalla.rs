//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/matrix/api-reference/

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{complete_rows, request_error, status_error, DistanceMatrix, RoutingError, RoutingService};
use crate::defaults::USER_AGENT;
use crate::types::{Coordinates, RouteGeometry};

const SERVICE: &str = "Valhalla";

/// Snapping radius in meters; geocoded building centroids may sit off-road
const SNAP_RADIUS_M: u32 = 500;

/// Valhalla routing client
pub struct ValhallaClient {
    client: Client,
    base_url: String,
}

impl ValhallaClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Valhalla")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn locations(locations: &[Coordinates]) -> Vec<ValhallaLocation> {
        locations
            .iter()
            .map(|c| ValhallaLocation {
                lat: c.lat,
                lon: c.lng,
                radius: Some(SNAP_RADIUS_M),
            })
            .collect()
    }

    /// Build the sources_to_targets request
    fn build_matrix_request(&self, locations: &[Coordinates]) -> MatrixRequest {
        let locs = Self::locations(locations);
        MatrixRequest {
            sources: locs.clone(),
            targets: locs,
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
        }
    }

    /// Build the route request for geometry
    fn build_route_request(&self, locations: &[Coordinates]) -> RouteRequest {
        RouteRequest {
            locations: Self::locations(locations),
            costing: "auto".to_string(),
            // Only geometry is needed, not turn-by-turn
            directions_type: "none".to_string(),
        }
    }

    async fn post<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &Req,
    ) -> Result<Resp, RoutingError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ValhallaError>(&body) {
                Ok(err) if status.is_client_error() && status.as_u16() != 429 => RoutingError::Api(format!(
                    "{} error {}: {}",
                    SERVICE, err.error_code, err.error
                )),
                _ => status_error(SERVICE, status, &body),
            });
        }

        response.json().await.map_err(|e| request_error(SERVICE, e))
    }
}

#[async_trait]
impl RoutingService for ValhallaClient {
    async fn get_matrix(&self, locations: &[Coordinates]) -> Result<DistanceMatrix, RoutingError> {
        let n = locations.len();
        if n == 0 {
            return Ok(DistanceMatrix::empty());
        }
        if n == 1 {
            return DistanceMatrix::new(vec![vec![0.0]], vec![vec![0.0]]);
        }

        debug!("Requesting distance matrix from Valhalla for {} locations", n);

        let response: MatrixResponse = self
            .post("sources_to_targets", &self.build_matrix_request(locations))
            .await?;

        let (distances, durations): (Vec<Vec<Option<f64>>>, Vec<Vec<Option<f64>>>) = response
            .sources_to_targets
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| (cell.distance, cell.time))
                    .unzip::<_, _, Vec<Option<f64>>, Vec<Option<f64>>>()
            })
            .unzip();

        // Distances come back in kilometers
        let matrix = DistanceMatrix::new(
            complete_rows("distance", distances, 1000.0)?,
            complete_rows("duration", durations, 1.0)?,
        )?;
        matrix.expect_size(n)?;

        debug!("Received distance matrix from Valhalla: {}x{}", n, n);
        Ok(matrix)
    }

    async fn get_route_geometry(&self, locations: &[Coordinates]) -> Result<RouteGeometry, RoutingError> {
        if locations.len() < 2 {
            return Ok(RouteGeometry::empty());
        }

        debug!("Requesting route geometry from Valhalla for {} locations", locations.len());

        let route_response: RouteResponse = self
            .post("route", &self.build_route_request(locations))
            .await?;

        // Concatenate all legs; each leg after the first repeats the previous end point
        let mut all_coordinates: Vec<[f64; 2]> = Vec::new();
        for (i, leg) in route_response.trip.legs.iter().enumerate() {
            let leg_coords = decode_polyline(&leg.shape, 6)?;
            let skip = usize::from(i > 0);
            all_coordinates.extend(leg_coords.into_iter().skip(skip));
        }

        debug!(
            "Received route geometry with {} total points from {} legs",
            all_coordinates.len(),
            route_response.trip.legs.len()
        );

        Ok(RouteGeometry {
            coordinates: all_coordinates,
        })
    }

    fn name(&self) -> &'static str {
        "valhalla"
    }
}

// Valhalla API types

#[derive(Debug, Serialize)]
struct MatrixRequest {
    sources: Vec<ValhallaLocation>,
    targets: Vec<ValhallaLocation>,
    costing: String,
    units: String,
}

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    sources_to_targets: Vec<Vec<MatrixCell>>,
}

#[derive(Debug, Deserialize)]
struct MatrixCell {
    /// Distance in kilometers (when units="kilometers")
    distance: Option<f64>,
    /// Time in seconds
    time: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    directions_type: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    /// Encoded polyline shape
    shape: String,
}

#[derive(Debug, Deserialize)]
struct ValhallaError {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error: String,
}

/// Decode one zig-zag varint value of an encoded polyline
fn decode_value(bytes: &[u8], i: &mut usize) -> Result<i64, RoutingError> {
    let mut shift = 0;
    let mut result = 0i64;
    loop {
        let Some(&b) = bytes.get(*i) else {
            return Err(RoutingError::Malformed("truncated polyline".to_string()));
        };
        let byte = b as i64 - 63;
        if !(0..64).contains(&byte) || shift > 60 {
            return Err(RoutingError::Malformed("invalid polyline encoding".to_string()));
        }
        *i += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

fn accumulate(position: i64, delta: i64) -> Result<i64, RoutingError> {
    position
        .checked_add(delta)
        .ok_or_else(|| RoutingError::Malformed("polyline coordinate out of range".to_string()))
}

/// Decode Valhalla's encoded polyline format into [lng, lat] pairs.
/// Precision is 6 decimal places for Valhalla (vs 5 for Google)
fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<[f64; 2]>, RoutingError> {
    let factor = 10_f64.powi(precision as i32);
    let bytes = encoded.as_bytes();
    let mut coordinates = Vec::new();
    let mut lat = 0i64;
    let mut lng = 0i64;
    let mut i = 0;

    while i < bytes.len() {
        lat = accumulate(lat, decode_value(bytes, &mut i)?)?;
        lng = accumulate(lng, decode_value(bytes, &mut i)?)?;
        coordinates.push([lng as f64 / factor, lat as f64 / factor]);
    }

    Ok(coordinates)
}
