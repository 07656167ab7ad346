//! Test doubles for external services

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;

use super::geocoding::{GeocodeError, Geocoder, GeocodingResult};
use super::routing::{DistanceMatrix, RoutingError, RoutingService};
use crate::types::Coordinates;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Geocoder answering from a fixed address table; unknown addresses are not found
#[derive(Default)]
pub struct StaticGeocoder {
    entries: HashMap<String, Coordinates>,
    calls: AtomicUsize,
    failures_left: AtomicU32,
    failure: Option<GeocodeError>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: &str, lat: f64, lng: f64) -> Self {
        self.entries.insert(address.trim().to_string(), Coordinates::new(lat, lng));
        self
    }

    /// Fail the first `count` calls with `error`
    pub fn failing_first(mut self, count: u32, error: GeocodeError) -> Self {
        self.failures_left = AtomicU32::new(count);
        self.failure = Some(error);
        self
    }

    /// Fail every call with `error`
    pub fn always_failing(self, error: GeocodeError) -> Self {
        self.failing_first(u32::MAX, error)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodingResult>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.failure {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                if left != u32::MAX {
                    self.failures_left.fetch_sub(1, Ordering::SeqCst);
                }
                return Err(error.clone());
            }
        }

        Ok(self.entries.get(address.trim()).map(|coordinates| GeocodingResult {
            coordinates: *coordinates,
            confidence: 0.9,
            display_name: address.to_string(),
        }))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Routing service returning a fixed matrix regardless of the locations
pub struct FixedMatrixRouting {
    result: Result<DistanceMatrix, RoutingError>,
    calls: AtomicUsize,
}

impl FixedMatrixRouting {
    /// Distances in meters; durations are derived at 10 m/s
    pub fn from_distances(distances: Vec<Vec<f64>>) -> Self {
        let durations = distances
            .iter()
            .map(|row| row.iter().map(|d| d / 10.0).collect())
            .collect();
        Self::new(DistanceMatrix::new(distances, durations).unwrap())
    }

    pub fn new(matrix: DistanceMatrix) -> Self {
        Self {
            result: Ok(matrix),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: RoutingError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingService for FixedMatrixRouting {
    async fn get_matrix(&self, _locations: &[Coordinates]) -> Result<DistanceMatrix, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
