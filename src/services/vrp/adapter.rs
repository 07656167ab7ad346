//! Adapter to build vrp-core problems.
//!
//! Matrix location `i` is request stop `i`. Every stop except the depot
//! becomes one job; a single vehicle starts and ends its tour at the depot.

use std::sync::Arc;

use vrp_core::prelude::*;

use super::SolverError;
use crate::services::routing::DistanceMatrix;

pub const DEFAULT_VEHICLE_ID: &str = "vehicle_1";

const JOB_PREFIX: &str = "stop-";

/// Job id for the stop at matrix index `index`
fn job_id(index: usize) -> String {
    format!("{}{}", JOB_PREFIX, index)
}

fn invalid(what: &str) -> impl Fn(GenericError) -> SolverError + '_ {
    move |e| SolverError::Failed(format!("failed to build {}: {}", what, e))
}

/// Row-major transport costs over the routing matrix
pub fn build_transport(matrix: &DistanceMatrix) -> Result<SimpleTransportCost, SolverError> {
    let size = matrix.size;
    let mut durations = Vec::with_capacity(size * size);
    let mut distances = Vec::with_capacity(size * size);

    for i in 0..size {
        for j in 0..size {
            durations.push(matrix.duration(i, j));
            distances.push(matrix.distance(i, j));
        }
    }

    SimpleTransportCost::new(durations, distances).map_err(invalid("transport costs"))
}

/// Distance is the only objective; tours are not time constrained
fn build_goal(transport: Arc<dyn TransportCost>) -> Result<GoalContext, SolverError> {
    let minimize_unassigned = MinimizeUnassignedBuilder::new("min-unassigned")
        .build()
        .map_err(invalid("goal"))?;
    let minimize_distance = TransportFeatureBuilder::new("min-distance")
        .set_transport_cost(transport)
        .set_time_constrained(false)
        .build_minimize_distance()
        .map_err(invalid("goal"))?;

    GoalContextBuilder::with_features(&[minimize_unassigned, minimize_distance])
        .and_then(|builder| builder.build())
        .map_err(invalid("goal"))
}

fn build_vehicle(depot: usize) -> GenericResult<Vehicle> {
    VehicleBuilder::default()
        .id(DEFAULT_VEHICLE_ID)
        .add_detail(
            VehicleDetailBuilder::default()
                .set_start_location(depot)
                .set_end_location(depot)
                .build()?,
        )
        .build()
}

/// Build the closed-tour problem over every matrix location.
/// Index creation timings are reported through `logger`.
pub fn build_problem(matrix: &DistanceMatrix, depot: usize, logger: InfoLogger) -> Result<Problem, SolverError> {
    let transport: Arc<dyn TransportCost> = Arc::new(build_transport(matrix)?);
    let goal = build_goal(transport.clone())?;

    let jobs = (0..matrix.size)
        .filter(|&index| index != depot)
        .map(|index| {
            SingleBuilder::default()
                .id(job_id(index).as_str())
                .location(index)?
                .build_as_job()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(invalid("jobs"))?;

    let vehicle = build_vehicle(depot).map_err(invalid("vehicle"))?;

    ProblemBuilder::default()
        .add_jobs(jobs.into_iter())
        .add_vehicle(vehicle)
        .with_goal(goal)
        .with_transport_cost(transport)
        .with_logger(logger)
        .build()
        .map_err(invalid("problem"))
}
