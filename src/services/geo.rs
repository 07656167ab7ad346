//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Road distance coefficient (straight line to road)
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Average speed in km/h for travel time estimation
pub const AVERAGE_SPEED_KMH: f64 = 40.0;

/// Haversine distance between two points in meters
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Estimate road distance in meters from straight-line distance
pub fn road_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    haversine_distance(from, to) * ROAD_COEFFICIENT
}

/// Estimate travel time in seconds
pub fn travel_time_seconds(from: &Coordinates, to: &Coordinates) -> f64 {
    let speed_mps = AVERAGE_SPEED_KMH * 1000.0 / 3600.0;
    road_distance(from, to) / speed_mps
}
