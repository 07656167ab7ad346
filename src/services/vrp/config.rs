//! Route solver configuration

use std::str::FromStr;

use crate::defaults::{DEFAULT_SOLVER_MAX_GENERATIONS, DEFAULT_SOLVER_TIME_LIMIT_SECONDS};

/// Solver implementation selected by SOLVER_BACKEND
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverBackend {
    /// vrp-core metaheuristic
    Metaheuristic,
    /// Nearest neighbour construction improved with 2-opt
    Heuristic,
}

impl FromStr for SolverBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metaheuristic" | "vrp-core" | "pragmatic" => Ok(SolverBackend::Metaheuristic),
            "heuristic" | "2opt" => Ok(SolverBackend::Heuristic),
            other => Err(format!(
                "unknown solver backend '{}' (expected metaheuristic or heuristic)",
                other
            )),
        }
    }
}

/// Configuration for the route solver
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    /// Maximum solving time in seconds
    pub max_time_seconds: u32,
    /// Maximum generations for metaheuristic
    pub max_generations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Metaheuristic,
            max_time_seconds: DEFAULT_SOLVER_TIME_LIMIT_SECONDS,
            max_generations: DEFAULT_SOLVER_MAX_GENERATIONS,
        }
    }
}

impl SolverConfig {
    pub fn new(backend: SolverBackend, max_time_seconds: u32, max_generations: usize) -> Self {
        Self {
            backend,
            max_time_seconds: max_time_seconds.max(1),
            max_generations: max_generations.max(1),
        }
    }

    /// Instant configuration for very fast response
    /// - Minimal solve time (~2 seconds)
    /// - May not find optimal solution
    #[cfg(test)]
    pub fn instant(backend: SolverBackend) -> Self {
        Self::new(backend, 2, 200)
    }
}
