//! Baseline comparison
//!
//! The baseline is the tour a driver would take without optimization:
//! depot first, then every other stop in request order, then back.

use crate::services::routing::DistanceMatrix;
use crate::types::RouteMetrics;

/// Closed input-order tour over `size` locations
pub fn baseline_route(size: usize, depot: usize) -> Vec<usize> {
    std::iter::once(depot)
        .chain((0..size).filter(|&i| i != depot))
        .chain(std::iter::once(depot))
        .collect()
}

/// Sum distance and duration along consecutive legs of `tour`
pub fn route_metrics(matrix: &DistanceMatrix, tour: &[usize]) -> RouteMetrics {
    tour.windows(2).fold(RouteMetrics::default(), |mut acc, leg| {
        acc.total_distance_meters += matrix.distance(leg[0], leg[1]);
        acc.total_time_seconds += matrix.duration(leg[0], leg[1]);
        acc
    })
}

/// Absolute and relative improvement of the optimized tour over the baseline
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Savings {
    pub distance_meters: f64,
    pub distance_percentage: f64,
    pub time_seconds: f64,
    pub time_percentage: f64,
}

impl Savings {
    pub fn between(baseline: &RouteMetrics, optimized: &RouteMetrics) -> Self {
        let distance_meters = baseline.total_distance_meters - optimized.total_distance_meters;
        let time_seconds = baseline.total_time_seconds - optimized.total_time_seconds;

        Self {
            distance_meters,
            distance_percentage: percentage(distance_meters, baseline.total_distance_meters),
            time_seconds,
            time_percentage: percentage(time_seconds, baseline.total_time_seconds),
        }
    }
}

fn percentage(saved: f64, total: f64) -> f64 {
    if total > 0.0 {
        saved / total * 100.0
    } else {
        0.0
    }
}

/// Keep the solver's tour unless driving the baseline is shorter
pub fn no_worse_than_baseline(matrix: &DistanceMatrix, optimized: Vec<usize>, baseline: &[usize]) -> Vec<usize> {
    let optimized_distance = route_metrics(matrix, &optimized).total_distance_meters;
    let baseline_distance = route_metrics(matrix, baseline).total_distance_meters;

    if optimized_distance > baseline_distance {
        tracing::warn!(
            "Solver tour ({:.0} m) is longer than input order ({:.0} m), keeping input order",
            optimized_distance,
            baseline_distance
        );
        baseline.to_vec()
    } else {
        optimized
    }
}
