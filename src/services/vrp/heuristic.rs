//! Nearest neighbour construction followed by 2-opt improvement.
//!
//! Deterministic: ties are broken by the lowest stop index. Handles
//! asymmetric matrices since reversing a segment is priced in both
//! directions.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{RouteSolver, SolverConfig, SolverError};
use crate::services::routing::DistanceMatrix;

/// Improvements smaller than this (meters) are ignored
const EPSILON: f64 = 1e-9;

pub struct HeuristicSolver {
    config: SolverConfig,
}

impl HeuristicSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl RouteSolver for HeuristicSolver {
    fn solve(&self, matrix: &DistanceMatrix, depot: usize) -> Result<Vec<usize>, SolverError> {
        if depot >= matrix.size {
            return Err(SolverError::Failed(format!(
                "depot {} outside matrix of size {}",
                depot, matrix.size
            )));
        }

        let deadline = Instant::now() + Duration::from_secs(u64::from(self.config.max_time_seconds));
        let mut tour = nearest_neighbor(matrix, depot);
        let initial = tour_distance(matrix, &tour);
        let passes = two_opt(matrix, &mut tour, deadline, self.config.max_generations);

        debug!(
            "Heuristic tour: nearest neighbour {:.0} m, after {} 2-opt passes {:.0} m",
            initial,
            passes,
            tour_distance(matrix, &tour)
        );
        Ok(tour)
    }

    fn name(&self) -> &'static str {
        "nearest-neighbor+2opt"
    }
}

/// Greedy closed tour from the depot, always moving to the closest unvisited stop
pub fn nearest_neighbor(matrix: &DistanceMatrix, depot: usize) -> Vec<usize> {
    let n = matrix.size;
    let mut visited = vec![false; n];
    let mut tour = Vec::with_capacity(n + 1);

    visited[depot] = true;
    tour.push(depot);
    let mut current = depot;

    while let Some(next) = (0..n)
        .filter(|&j| !visited[j])
        .min_by(|&a, &b| matrix.distance(current, a).total_cmp(&matrix.distance(current, b)))
    {
        visited[next] = true;
        tour.push(next);
        current = next;
    }

    tour.push(depot);
    tour
}

pub fn tour_distance(matrix: &DistanceMatrix, tour: &[usize]) -> f64 {
    tour.windows(2).map(|leg| matrix.distance(leg[0], leg[1])).sum()
}

/// Cost change of reversing `tour[i..=j]`
fn reversal_delta(matrix: &DistanceMatrix, tour: &[usize], i: usize, j: usize) -> f64 {
    let before = tour[i - 1];
    let after = tour[j + 1];

    let mut delta = matrix.distance(before, tour[j]) + matrix.distance(tour[i], after)
        - matrix.distance(before, tour[i])
        - matrix.distance(tour[j], after);

    for k in i..j {
        delta += matrix.distance(tour[k + 1], tour[k]) - matrix.distance(tour[k], tour[k + 1]);
    }
    delta
}

/// First-improvement 2-opt over the inner stops. Returns the number of passes.
pub fn two_opt(matrix: &DistanceMatrix, tour: &mut [usize], deadline: Instant, max_passes: usize) -> usize {
    let len = tour.len();
    if len < 4 {
        return 0;
    }

    let mut passes = 0;
    let mut improved = true;
    while improved && passes < max_passes {
        improved = false;
        passes += 1;

        for i in 1..len - 2 {
            if Instant::now() >= deadline {
                return passes;
            }
            for j in i + 1..len - 1 {
                if reversal_delta(matrix, tour, i, j) < -EPSILON {
                    tour[i..=j].reverse();
                    improved = true;
                }
            }
        }
    }
    passes
}
