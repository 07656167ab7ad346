//! Route optimization request/response types

use serde::{Deserialize, Serialize};

use super::{Coordinates, Stop};

/// Request payload for route optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub stops: Vec<Stop>,
    /// Index of the start/end stop (default: first stop)
    #[serde(default)]
    pub depot_index: usize,
}

/// Totals for a closed tour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub total_distance_meters: f64,
    pub total_time_seconds: f64,
}

/// Route geometry as GeoJSON coordinates
/// Coordinates are in [longitude, latitude] order (GeoJSON standard)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    pub fn empty() -> Self {
        Self { coordinates: vec![] }
    }

    /// Straight segments between the given points
    pub fn from_coordinates(coords: &[Coordinates]) -> Self {
        Self {
            coordinates: coords.iter().map(|c| [c.lng, c.lat]).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// Optimized route compared against the input-order baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResponse {
    /// Stops in visit order, starting and ending at the depot
    pub optimized_route: Vec<Stop>,
    pub optimized_metrics: RouteMetrics,
    pub baseline_metrics: RouteMetrics,
    pub distance_saved_meters: f64,
    pub distance_saved_percentage: f64,
    pub time_saved_seconds: f64,
    pub time_saved_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_geometry: Option<RouteGeometry>,
    /// Solver backend that produced the route
    pub algorithm: String,
    pub solve_time_ms: u64,
}
