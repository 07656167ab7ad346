//! vrp-core metaheuristic solver integration.

use std::sync::Arc;

use tracing::debug;
use vrp_core::prelude::*;

use super::{build_problem, RouteSolver, SolverConfig, SolverError};
use crate::services::routing::DistanceMatrix;

/// Solver progress goes to tracing instead of stdout
fn tracing_logger() -> InfoLogger {
    Arc::new(|msg: &str| debug!("vrp-core: {}", msg))
}

/// Metaheuristic solver backed by vrp-core
pub struct MetaheuristicSolver {
    config: SolverConfig,
    logger: InfoLogger,
}

impl MetaheuristicSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            logger: tracing_logger(),
        }
    }

    #[cfg(test)]
    fn with_logger(mut self, logger: InfoLogger) -> Self {
        self.logger = logger;
        self
    }

    fn environment(&self) -> Arc<Environment> {
        let max_time = Some(self.config.max_time_seconds as usize);
        Arc::new(Environment {
            logger: self.logger.clone(),
            ..Environment::new_with_time_quota(max_time)
        })
    }
}

impl RouteSolver for MetaheuristicSolver {
    fn solve(&self, matrix: &DistanceMatrix, depot: usize) -> Result<Vec<usize>, SolverError> {
        let problem = Arc::new(build_problem(matrix, depot, self.logger.clone())?);

        let solver_config = VrpConfigBuilder::new(problem.clone())
            .set_environment(self.environment())
            .prebuild()
            .map(|builder| {
                builder
                    .with_max_time(Some(self.config.max_time_seconds as usize))
                    .with_max_generations(Some(self.config.max_generations))
            })
            .and_then(|builder| builder.build())
            .map_err(|e| SolverError::Failed(format!("failed to build solver configuration: {}", e)))?;

        let solution = Solver::new(problem, solver_config)
            .solve()
            .map_err(|e| SolverError::Failed(format!("vrp-core failed: {}", e)))?;

        map_solution(&solution, matrix.size)
    }

    fn name(&self) -> &'static str {
        "vrp-core"
    }
}

/// Turn the single vehicle tour into a closed sequence of matrix indices
fn map_solution(solution: &Solution, size: usize) -> Result<Vec<usize>, SolverError> {
    if !solution.unassigned.is_empty() {
        return Err(SolverError::NoSolution(format!(
            "{} stops could not be routed",
            solution.unassigned.len()
        )));
    }

    let tour: Vec<usize> = solution
        .get_locations()
        .next()
        .map(|locations| locations.collect())
        .unwrap_or_default();

    if tour.len() != size + 1 {
        return Err(SolverError::NoSolution(format!(
            "solution visits {} of {} stops",
            tour.len().saturating_sub(2),
            size.saturating_sub(1)
        )));
    }

    debug!("vrp-core tour: cost={}", solution.cost);
    Ok(tour)
}
