//! Route solver
//!
//! Finds a closed tour from the depot through every stop. Two backends:
//! the vrp-core metaheuristic for quality, nearest neighbour + 2-opt as a
//! fast deterministic alternative.

mod adapter;
mod config;
mod heuristic;
mod metaheuristic;

pub use adapter::build_problem;
pub use config::{SolverBackend, SolverConfig};
pub use heuristic::HeuristicSolver;
pub use metaheuristic::MetaheuristicSolver;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::services::baseline::route_metrics;
use crate::services::routing::DistanceMatrix;
use crate::types::ErrorCode;

/// Slack on top of the solver's own time budget before the run is abandoned
const SOLVER_GUARD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("solver did not finish within {0} seconds")]
    Timeout(u64),

    #[error("no feasible route: {0}")]
    NoSolution(String),

    #[error("solver failed: {0}")]
    Failed(String),
}

impl SolverError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SolverError::Timeout(_) => ErrorCode::SolverTimeout,
            SolverError::NoSolution(_) => ErrorCode::SolverNoSolution,
            SolverError::Failed(_) => ErrorCode::SolverFailed,
        }
    }
}

/// A solver computes a closed tour `[depot, ..., depot]` over every matrix index
pub trait RouteSolver: Send + Sync {
    fn solve(&self, matrix: &DistanceMatrix, depot: usize) -> Result<Vec<usize>, SolverError>;

    fn name(&self) -> &'static str;
}

/// Create the solver selected in configuration
pub fn create_solver(config: &SolverConfig) -> Arc<dyn RouteSolver> {
    match config.backend {
        SolverBackend::Metaheuristic => {
            info!(
                "Using vrp-core solver (time limit {}s, {} generations)",
                config.max_time_seconds, config.max_generations
            );
            Arc::new(MetaheuristicSolver::new(config.clone()))
        }
        SolverBackend::Heuristic => {
            info!("Using nearest neighbour + 2-opt solver");
            Arc::new(HeuristicSolver::new(config.clone()))
        }
    }
}

/// Check the closed-tour invariant: starts and ends at the depot and visits
/// every other index exactly once
pub fn validate_tour(tour: &[usize], size: usize, depot: usize) -> Result<(), SolverError> {
    if depot >= size {
        return Err(SolverError::Failed(format!("depot {} outside {} locations", depot, size)));
    }
    if tour.len() != size + 1 {
        return Err(SolverError::Failed(format!(
            "tour has {} entries, expected {}",
            tour.len(),
            size + 1
        )));
    }
    if tour.first() != Some(&depot) || tour.last() != Some(&depot) {
        return Err(SolverError::Failed("tour does not start and end at the depot".to_string()));
    }

    let mut seen = vec![false; size];
    seen[depot] = true;
    for &index in &tour[1..size] {
        if index >= size || seen[index] {
            return Err(SolverError::Failed(format!("stop {} visited twice or out of range", index)));
        }
        seen[index] = true;
    }
    Ok(())
}

/// Pick a canonical direction for the tour.
///
/// When driving the tour backwards costs exactly the same, the
/// lexicographically smaller sequence is returned so equal inputs produce
/// equal outputs regardless of the direction the solver happened to find.
pub fn normalize_orientation(matrix: &DistanceMatrix, tour: Vec<usize>) -> Vec<usize> {
    let reversed: Vec<usize> = tour.iter().rev().copied().collect();
    if reversed >= tour {
        return tour;
    }

    let forward = route_metrics(matrix, &tour);
    let backward = route_metrics(matrix, &reversed);
    if nearly_equal(forward.total_distance_meters, backward.total_distance_meters)
        && nearly_equal(forward.total_time_seconds, backward.total_time_seconds)
    {
        reversed
    } else {
        tour
    }
}

/// Equal up to summation-order rounding
fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

/// Run `solver` on the blocking pool with a wall-clock guard of the time
/// budget plus a few seconds, then validate the returned tour
pub async fn solve_with_budget(
    solver: Arc<dyn RouteSolver>,
    matrix: Arc<DistanceMatrix>,
    depot: usize,
    budget: Duration,
) -> Result<Vec<usize>, SolverError> {
    let size = matrix.size;

    // Nothing to optimize with a single non-depot stop
    if size <= 2 {
        let tour: Vec<usize> = std::iter::once(depot)
            .chain((0..size).filter(|&i| i != depot))
            .chain(std::iter::once(depot))
            .collect();
        validate_tour(&tour, size, depot)?;
        return Ok(tour);
    }

    let tour = run_guarded(solver, matrix.clone(), depot, budget + SOLVER_GUARD).await?;
    validate_tour(&tour, size, depot)?;

    Ok(normalize_orientation(&matrix, tour))
}

async fn run_guarded(
    solver: Arc<dyn RouteSolver>,
    matrix: Arc<DistanceMatrix>,
    depot: usize,
    guard: Duration,
) -> Result<Vec<usize>, SolverError> {
    let name = solver.name();
    let started = Instant::now();
    let handle = tokio::task::spawn_blocking(move || solver.solve(&matrix, depot));

    let tour = match tokio::time::timeout(guard, handle).await {
        Err(_) => {
            warn!("Solver {} exceeded {:?}, abandoning run", name, guard);
            return Err(SolverError::Timeout(guard.as_secs()));
        }
        Ok(Err(join_error)) => {
            error!("Solver {} panicked: {}", name, join_error);
            return Err(SolverError::Failed("solver crashed".to_string()));
        }
        Ok(Ok(result)) => result?,
    };

    debug!("Solver {} finished in {:?}", name, started.elapsed());
    Ok(tour)
}
