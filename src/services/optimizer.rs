//! Route optimization pipeline
//!
//! validate -> geocode -> distance matrix -> solve -> compare with baseline.
//! Every stage either hands its output to the next one or ends the request
//! with an [`OptimizeError`] naming the failing stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::baseline::{baseline_route, no_worse_than_baseline, route_metrics, Savings};
use super::geocoding::{create_geocoder, failure_code, GeocodeFailure, GeocodingResolver};
use super::geocoding_cache::GeocodeCache;
use super::retry::{retry_with_backoff, RetryConfig};
use super::routing::{create_routing_service, DistanceMatrix, RoutingError, RoutingService};
use super::vrp::{create_solver, solve_with_budget, RouteSolver, SolverConfig, SolverError};
use crate::config::Config;
use crate::defaults::{MAX_STOPS, MIN_STOPS};
use crate::types::{
    Coordinates, ErrorCode, ErrorDetail, ErrorResponse, OptimizationRequest, OptimizationResponse,
    RouteGeometry, Stage, Stop,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("{message}")]
    Validation {
        code: ErrorCode,
        message: String,
        details: Vec<ErrorDetail>,
    },

    #[error("failed to geocode {} address(es)", .0.len())]
    Geocoding(Vec<GeocodeFailure>),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OptimizeError {
    fn validation(code: ErrorCode, details: Vec<ErrorDetail>) -> Self {
        OptimizeError::Validation {
            code,
            message: code.default_message().to_string(),
            details,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            OptimizeError::Validation { .. } => Stage::Validation,
            OptimizeError::Geocoding(_) => Stage::Geocoding,
            OptimizeError::Routing(_) => Stage::DistanceMatrix,
            OptimizeError::Solver(_) => Stage::Solving,
            OptimizeError::Internal(_) => Stage::Response,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            OptimizeError::Validation { code, .. } => *code,
            OptimizeError::Geocoding(failures) => failure_code(failures),
            OptimizeError::Routing(e) => e.error_code(),
            OptimizeError::Solver(e) => e.error_code(),
            OptimizeError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Structured body for the presentation layer
    pub fn to_response(&self) -> ErrorResponse {
        let response = ErrorResponse::new(self.code(), self.stage());
        match self {
            OptimizeError::Validation { message, details, .. } => {
                response.with_message(message.clone()).with_details(details.clone())
            }
            OptimizeError::Geocoding(failures) => response
                .with_message(format!(
                    "{} ({} of the submitted addresses)",
                    self.code().default_message(),
                    failures.len()
                ))
                .with_details(failures.iter().map(GeocodeFailure::detail).collect()),
            OptimizeError::Routing(e) => {
                response.with_message(format!("{}: {}", self.code().default_message(), e))
            }
            OptimizeError::Solver(e) => {
                response.with_message(format!("{}: {}", self.code().default_message(), e))
            }
            OptimizeError::Internal(_) => response,
        }
    }
}

/// Check a request before any external service is contacted
pub fn validate_request(request: &OptimizationRequest) -> Result<(), OptimizeError> {
    let count = request.stops.len();

    if count < MIN_STOPS {
        return Err(OptimizeError::validation(
            ErrorCode::InsufficientStops,
            vec![ErrorDetail::new("stops", format!("Received {} stop(s), at least {} required", count, MIN_STOPS))
                .with_value(count)],
        ));
    }
    if count > MAX_STOPS {
        return Err(OptimizeError::validation(
            ErrorCode::TooManyStops,
            vec![ErrorDetail::new("stops", format!("Received {} stops, at most {} allowed", count, MAX_STOPS))
                .with_value(count)],
        ));
    }

    if request.depot_index >= count {
        return Err(OptimizeError::validation(
            ErrorCode::InvalidDepotIndex,
            vec![ErrorDetail::new(
                "depot_index",
                format!("depot_index must be between 0 and {}", count - 1),
            )
            .with_value(request.depot_index)],
        ));
    }

    let missing: Vec<ErrorDetail> = request
        .stops
        .iter()
        .enumerate()
        .filter(|(_, stop)| !stop.has_coordinates() && stop.address().is_none())
        .map(|(i, _)| {
            ErrorDetail::new(
                format!("stops[{}]", i),
                "Stop must have either an address or both latitude and longitude",
            )
        })
        .collect();
    if !missing.is_empty() {
        return Err(OptimizeError::validation(ErrorCode::InvalidInput, missing));
    }

    let mut out_of_range = Vec::new();
    for (i, stop) in request.stops.iter().enumerate() {
        if let Some(lat) = stop.latitude.filter(|&lat| !Coordinates::is_valid_latitude(lat)) {
            out_of_range.push(
                ErrorDetail::new(format!("stops[{}].latitude", i), "Latitude must be between -90 and 90")
                    .with_value(lat),
            );
        }
        if let Some(lng) = stop.longitude.filter(|&lng| !Coordinates::is_valid_longitude(lng)) {
            out_of_range.push(
                ErrorDetail::new(format!("stops[{}].longitude", i), "Longitude must be between -180 and 180")
                    .with_value(lng),
            );
        }
    }
    if !out_of_range.is_empty() {
        return Err(OptimizeError::validation(ErrorCode::InvalidCoordinates, out_of_range));
    }

    Ok(())
}

/// Sequences geocoding, routing and solving for one request
pub struct RouteOptimizer {
    resolver: GeocodingResolver,
    routing: Arc<dyn RoutingService>,
    routing_retry: RetryConfig,
    solver: Arc<dyn RouteSolver>,
    solver_config: SolverConfig,
    route_geometry: bool,
}

impl RouteOptimizer {
    pub fn new(
        resolver: GeocodingResolver,
        routing: Arc<dyn RoutingService>,
        routing_retry: RetryConfig,
        solver: Arc<dyn RouteSolver>,
        solver_config: SolverConfig,
    ) -> Self {
        Self {
            resolver,
            routing,
            routing_retry,
            solver,
            solver_config,
            route_geometry: false,
        }
    }

    /// Also fetch the road geometry of the optimized tour
    pub fn with_route_geometry(mut self, enabled: bool) -> Self {
        self.route_geometry = enabled;
        self
    }

    /// Wire every component from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let cache = Arc::new(GeocodeCache::with_ttl_days(
            config.geocoding_cache_size,
            config.geocoding_cache_ttl_days,
        ));
        let resolver = GeocodingResolver::new(
            create_geocoder(config)?,
            cache,
            RetryConfig::new(config.geocoding_max_attempts, Duration::from_secs(2), Duration::from_secs(10)),
            config.geocoding_timeout,
        );

        let solver_config = config.solver_config();
        Ok(Self::new(
            resolver,
            create_routing_service(config)?,
            RetryConfig::new(config.routing_max_attempts, Duration::from_secs(1), Duration::from_secs(8)),
            create_solver(&solver_config),
            solver_config,
        )
        .with_route_geometry(config.route_geometry))
    }

    pub fn resolver(&self) -> &GeocodingResolver {
        &self.resolver
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    pub fn routing_name(&self) -> &'static str {
        self.routing.name()
    }

    pub async fn optimize(&self, request: OptimizationRequest) -> Result<OptimizationResponse, OptimizeError> {
        validate_request(&request)?;
        let OptimizationRequest { mut stops, depot_index } = request;
        debug!("Validated request: {} stops, depot {}", stops.len(), depot_index);

        match self.resolver.resolve_stops(&mut stops).await {
            Ok(0) => {}
            Ok(geocoded) => debug!("Geocoded {} stops", geocoded),
            Err(failures) => {
                warn!("Geocoding failed for {} stops", failures.len());
                return Err(OptimizeError::Geocoding(failures));
            }
        }

        let locations = stop_locations(&stops)?;
        let matrix = self.fetch_matrix(&locations).await?;
        debug!("Distance matrix {}x{} from {}", matrix.size, matrix.size, self.routing.name());

        let started = Instant::now();
        let budget = Duration::from_secs(u64::from(self.solver_config.max_time_seconds));
        let solved = solve_with_budget(self.solver.clone(), matrix.clone(), depot_index, budget).await?;
        let solve_time_ms = started.elapsed().as_millis() as u64;

        let baseline = baseline_route(matrix.size, depot_index);
        let tour = no_worse_than_baseline(&matrix, solved, &baseline);

        let optimized_metrics = route_metrics(&matrix, &tour);
        let baseline_metrics = route_metrics(&matrix, &baseline);
        let savings = Savings::between(&baseline_metrics, &optimized_metrics);

        let route_geometry = if self.route_geometry {
            let tour_locations: Vec<Coordinates> = tour.iter().map(|&i| locations[i]).collect();
            Some(self.fetch_geometry(&tour_locations).await)
        } else {
            None
        };

        info!(
            "Optimized {} stops with {}: {:.0} m vs {:.0} m baseline ({:.1}% saved) in {} ms",
            stops.len(),
            self.solver.name(),
            optimized_metrics.total_distance_meters,
            baseline_metrics.total_distance_meters,
            savings.distance_percentage,
            solve_time_ms
        );

        Ok(OptimizationResponse {
            optimized_route: tour.iter().map(|&i| stops[i].clone()).collect(),
            optimized_metrics,
            baseline_metrics,
            distance_saved_meters: savings.distance_meters,
            distance_saved_percentage: savings.distance_percentage,
            time_saved_seconds: savings.time_seconds,
            time_saved_percentage: savings.time_percentage,
            route_geometry,
            algorithm: self.solver.name().to_string(),
            solve_time_ms,
        })
    }

    async fn fetch_matrix(&self, locations: &[Coordinates]) -> Result<Arc<DistanceMatrix>, OptimizeError> {
        let matrix = retry_with_backoff(&self.routing_retry, "Distance matrix", RoutingError::is_transient, || {
            self.routing.get_matrix(locations)
        })
        .await?;

        matrix.expect_size(locations.len())?;
        Ok(Arc::new(matrix))
    }

    /// Road geometry of the tour, straight segments when the provider fails
    async fn fetch_geometry(&self, locations: &[Coordinates]) -> RouteGeometry {
        match self.routing.get_route_geometry(locations).await {
            Ok(geometry) if !geometry.is_empty() => geometry,
            Ok(_) => RouteGeometry::from_coordinates(locations),
            Err(e) => {
                warn!("Failed to get route geometry: {}. Using straight lines.", e);
                RouteGeometry::from_coordinates(locations)
            }
        }
    }
}

/// Coordinates of every stop once geocoding has run
fn stop_locations(stops: &[Stop]) -> Result<Vec<Coordinates>, OptimizeError> {
    stops
        .iter()
        .enumerate()
        .map(|(i, stop)| {
            stop.coordinates()
                .ok_or_else(|| OptimizeError::Internal(format!("stop {} has no coordinates after geocoding", i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geocoding::{GeocodeError, Geocoder};
    use crate::services::routing::MockRoutingService;
    use crate::services::testing::{FixedMatrixRouting, StaticGeocoder};
    use crate::services::vrp::{validate_tour, SolverBackend};
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    fn abc_geocoder() -> Arc<StaticGeocoder> {
        Arc::new(
            StaticGeocoder::new()
                .with_address("A", 40.7128, -74.0060)
                .with_address("B", 40.7306, -73.9866)
                .with_address("C", 40.7580, -73.9855),
        )
    }

    fn abc_matrix() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 2500.0, 5200.0],
            vec![2600.0, 0.0, 3100.0],
            vec![5000.0, 3000.0, 0.0],
        ]
    }

    fn optimizer(
        geocoder: Arc<dyn Geocoder>,
        routing: Arc<dyn RoutingService>,
        backend: SolverBackend,
    ) -> RouteOptimizer {
        let resolver = GeocodingResolver::new(
            geocoder,
            Arc::new(GeocodeCache::with_ttl_days(100, 30)),
            RetryConfig::immediate(2),
            Duration::from_secs(1),
        );
        let solver_config = SolverConfig::instant(backend);
        RouteOptimizer::new(
            resolver,
            routing,
            RetryConfig::immediate(3),
            create_solver(&solver_config),
            solver_config,
        )
    }

    fn request(stops: Vec<Stop>, depot_index: usize) -> OptimizationRequest {
        OptimizationRequest { stops, depot_index }
    }

    fn grid_stops(count: usize) -> Vec<Stop> {
        (0..count)
            .map(|i| {
                let row = (i / 10) as f64;
                let col = (i % 10) as f64;
                Stop::from_coordinates(40.70 + row * 0.004, -74.01 + col * 0.005)
            })
            .collect()
    }

    #[tokio::test]
    async fn address_only_request_is_geocoded_and_solved() {
        for backend in [SolverBackend::Heuristic, SolverBackend::Metaheuristic] {
            let optimizer = optimizer(
                abc_geocoder(),
                Arc::new(FixedMatrixRouting::from_distances(abc_matrix())),
                backend,
            );
            let stops = vec![Stop::from_address("A"), Stop::from_address("B"), Stop::from_address("C")];

            let response = optimizer.optimize(request(stops, 0)).await.unwrap();

            assert_eq!(response.optimized_route.len(), 4);
            assert!(response.distance_saved_percentage >= 0.0);
            assert!(response.optimized_route.iter().all(|stop| stop.geocoded));
            assert_eq!(response.optimized_route[0].original_address.as_deref(), Some("A"));
            assert_eq!(response.optimized_route[3], response.optimized_route[0]);
            assert!(response.route_geometry.is_none());
        }
    }

    #[tokio::test]
    async fn unknown_address_fails_geocoding_with_detail() {
        let routing = Arc::new(FixedMatrixRouting::from_distances(abc_matrix()));
        let optimizer = optimizer(abc_geocoder(), routing.clone(), SolverBackend::Heuristic);
        let stops = vec![
            Stop::from_address("A"),
            Stop::from_address("Nowhere Lane 404"),
            Stop::from_address("C"),
        ];

        let err = optimizer.optimize(request(stops, 0)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::GeocodingFailed);
        assert_eq!(err.code().http_status(), 400);
        let body = err.to_response();
        assert_eq!(body.stage, Stage::Geocoding);
        assert_eq!(body.details.len(), 1);
        assert_eq!(body.details[0].field.as_deref(), Some("stops[1].address"));
        assert_eq!(body.details[0].value, Some(serde_json::json!("Nowhere Lane 404")));
        assert_eq!(routing.calls(), 0);
    }

    #[tokio::test]
    async fn every_geocoding_failure_is_reported() {
        let optimizer = optimizer(
            abc_geocoder(),
            Arc::new(MockRoutingService::new()),
            SolverBackend::Heuristic,
        );
        let stops = vec![
            Stop::from_address("Lost 1"),
            Stop::from_coordinates(40.0, -74.0),
            Stop::from_address("Lost 2"),
        ];

        let err = optimizer.optimize(request(stops, 1)).await.unwrap_err();

        let fields: Vec<_> = err
            .to_response()
            .details
            .into_iter()
            .filter_map(|d| d.field)
            .collect();
        assert_eq!(fields, vec!["stops[0].address", "stops[2].address"]);
    }

    #[tokio::test]
    async fn geocoding_timeouts_map_to_timeout_code() {
        let geocoder = Arc::new(StaticGeocoder::new().always_failing(GeocodeError::Timeout));
        let optimizer = optimizer(geocoder, Arc::new(MockRoutingService::new()), SolverBackend::Heuristic);

        let err = optimizer
            .optimize(request(vec![Stop::from_address("A"), Stop::from_address("B")], 0))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::GeocodingTimeout);
        assert_eq!(err.code().http_status(), 504);
    }

    #[tokio::test]
    async fn stop_count_bounds_are_enforced() {
        let optimizer = optimizer(abc_geocoder(), Arc::new(MockRoutingService::new()), SolverBackend::Heuristic);

        let err = optimizer.optimize(request(grid_stops(1), 0)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStops);
        assert_eq!(err.stage(), Stage::Validation);

        let err = optimizer.optimize(request(grid_stops(101), 0)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TooManyStops);

        assert_ok!(optimizer.optimize(request(grid_stops(2), 0)).await);
    }

    #[tokio::test]
    async fn depot_index_must_point_at_a_stop() {
        let optimizer = optimizer(abc_geocoder(), Arc::new(MockRoutingService::new()), SolverBackend::Heuristic);

        let err = optimizer.optimize(request(grid_stops(3), 3)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidDepotIndex);
        assert_eq!(err.to_response().details[0].value, Some(serde_json::json!(3)));
    }

    #[test]
    fn validation_aggregates_problems_of_one_kind() {
        let stops = vec![
            Stop::default(),
            Stop::from_coordinates(1.0, 1.0),
            Stop {
                latitude: Some(5.0),
                ..Default::default()
            },
        ];
        let err = validate_request(&request(stops, 0)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert_eq!(err.to_response().details.len(), 2);

        let stops = vec![
            Stop::from_coordinates(91.0, 0.0),
            Stop::from_coordinates(0.0, 0.0),
            Stop::from_coordinates(0.0, -180.5),
        ];
        let err = validate_request(&request(stops, 0)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCoordinates);
        let fields: Vec<_> = err
            .to_response()
            .details
            .into_iter()
            .filter_map(|d| d.field)
            .collect();
        assert_eq!(fields, vec!["stops[0].latitude", "stops[2].longitude"]);
    }

    #[test]
    fn stop_with_address_and_one_coordinate_is_valid() {
        let stops = vec![
            Stop {
                longitude: Some(-74.0),
                address: Some("350 5th Ave".to_string()),
                ..Default::default()
            },
            Stop::from_coordinates(40.0, -74.0),
        ];
        assert!(validate_request(&request(stops, 0)).is_ok());
    }

    #[tokio::test]
    async fn invalid_request_contacts_no_service() {
        let geocoder = abc_geocoder();
        let routing = Arc::new(FixedMatrixRouting::from_distances(abc_matrix()));
        let optimizer = optimizer(geocoder.clone(), routing.clone(), SolverBackend::Heuristic);
        let stops = vec![Stop::from_address("A"), Stop::from_coordinates(100.0, 0.0)];

        let err = optimizer.optimize(request(stops, 0)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidCoordinates);
        assert_eq!(geocoder.calls(), 0);
        assert_eq!(routing.calls(), 0);
    }

    #[tokio::test]
    async fn optimized_route_is_never_longer_than_input_order() {
        let optimizer = optimizer(abc_geocoder(), Arc::new(MockRoutingService::new()), SolverBackend::Heuristic);
        let mut stops = grid_stops(30);
        // Zig-zag input order
        stops.sort_by_key(|stop| ((stop.longitude.unwrap_or_default() * 1000.0) as i64) % 7);

        let response = optimizer.optimize(request(stops, 4)).await.unwrap();

        assert!(
            response.optimized_metrics.total_distance_meters <= response.baseline_metrics.total_distance_meters
        );
        assert!(response.distance_saved_meters >= 0.0);
        assert_eq!(response.optimized_route.len(), 31);
        assert_eq!(response.optimized_route.first(), response.optimized_route.last());
    }

    #[tokio::test]
    async fn route_visits_every_stop_once() {
        let optimizer = optimizer(abc_geocoder(), Arc::new(MockRoutingService::new()), SolverBackend::Heuristic);
        let stops = grid_stops(12);

        let response = optimizer.optimize(request(stops.clone(), 5)).await.unwrap();

        let indices: Vec<usize> = response
            .optimized_route
            .iter()
            .map(|visited| stops.iter().position(|s| s == visited).unwrap())
            .collect();
        assert!(validate_tour(&indices, 12, 5).is_ok());
    }

    #[tokio::test]
    async fn repeated_requests_produce_identical_routes() {
        let optimizer = optimizer(abc_geocoder(), Arc::new(MockRoutingService::new()), SolverBackend::Heuristic);
        let stops = grid_stops(15);

        let first = optimizer.optimize(request(stops.clone(), 0)).await.unwrap();
        let second = optimizer.optimize(request(stops, 0)).await.unwrap();

        assert_eq!(first.optimized_route, second.optimized_route);
        assert_eq!(first.optimized_metrics, second.optimized_metrics);
    }

    #[tokio::test]
    async fn repeated_addresses_hit_the_cache() {
        let geocoder = abc_geocoder();
        let optimizer = optimizer(geocoder.clone(), Arc::new(MockRoutingService::new()), SolverBackend::Heuristic);

        optimizer
            .optimize(request(vec![Stop::from_address("A"), Stop::from_address("B")], 0))
            .await
            .unwrap();
        optimizer
            .optimize(request(vec![Stop::from_address("  a "), Stop::from_address("B")], 0))
            .await
            .unwrap();

        assert_eq!(geocoder.calls(), 2);
        assert_eq!(optimizer.resolver().cache().stats().hits, 2);
    }

    #[tokio::test]
    async fn routing_failures_map_to_their_codes() {
        let cases = [
            (RoutingError::Timeout("osrm".into()), ErrorCode::RoutingServiceTimeout, 3),
            (RoutingError::Unavailable("down".into()), ErrorCode::RoutingServiceUnavailable, 3),
            (RoutingError::Api("NoRoute".into()), ErrorCode::RoutingServiceError, 1),
        ];

        for (error, code, expected_calls) in cases {
            let routing = Arc::new(FixedMatrixRouting::failing(error));
            let optimizer = optimizer(abc_geocoder(), routing.clone(), SolverBackend::Heuristic);

            let err = optimizer.optimize(request(grid_stops(3), 0)).await.unwrap_err();

            assert_eq!(err.code(), code);
            assert_eq!(err.stage(), Stage::DistanceMatrix);
            assert_eq!(err.code().http_status(), 503);
            assert_eq!(routing.calls(), expected_calls);
        }
    }

    #[tokio::test]
    async fn matrix_of_wrong_size_is_rejected() {
        let optimizer = optimizer(
            abc_geocoder(),
            Arc::new(FixedMatrixRouting::from_distances(abc_matrix())),
            SolverBackend::Heuristic,
        );

        let err = optimizer.optimize(request(grid_stops(4), 0)).await.unwrap_err();

        assert!(matches!(err, OptimizeError::Routing(RoutingError::Malformed(_))));
        assert_eq!(err.code(), ErrorCode::RoutingServiceError);
    }

    struct NoSolutionSolver;

    impl RouteSolver for NoSolutionSolver {
        fn solve(&self, _matrix: &DistanceMatrix, _depot: usize) -> Result<Vec<usize>, SolverError> {
            Err(SolverError::NoSolution("stop-2 unreachable".into()))
        }

        fn name(&self) -> &'static str {
            "none"
        }
    }

    #[tokio::test]
    async fn solver_failure_is_reported_at_solving_stage() {
        let resolver = GeocodingResolver::new(
            abc_geocoder(),
            Arc::new(GeocodeCache::with_ttl_days(10, 1)),
            RetryConfig::immediate(1),
            Duration::from_secs(1),
        );
        let optimizer = RouteOptimizer::new(
            resolver,
            Arc::new(MockRoutingService::new()),
            RetryConfig::immediate(1),
            Arc::new(NoSolutionSolver),
            SolverConfig::instant(SolverBackend::Heuristic),
        );

        let err = optimizer.optimize(request(grid_stops(4), 0)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::SolverNoSolution);
        let body = err.to_response();
        assert_eq!(body.stage, Stage::Solving);
        assert!(body.message.contains("stop-2 unreachable"));
    }

    struct BrokenGeometry;

    #[async_trait]
    impl RoutingService for BrokenGeometry {
        async fn get_matrix(&self, locations: &[Coordinates]) -> Result<DistanceMatrix, RoutingError> {
            MockRoutingService::new().get_matrix(locations).await
        }

        async fn get_route_geometry(&self, _locations: &[Coordinates]) -> Result<RouteGeometry, RoutingError> {
            Err(RoutingError::Unavailable("geometry down".into()))
        }

        fn name(&self) -> &'static str {
            "broken-geometry"
        }
    }

    #[tokio::test]
    async fn geometry_failure_falls_back_to_straight_lines() {
        let optimizer = optimizer(abc_geocoder(), Arc::new(BrokenGeometry), SolverBackend::Heuristic)
            .with_route_geometry(true);

        let response = optimizer.optimize(request(grid_stops(3), 0)).await.unwrap();

        let geometry = response.route_geometry.unwrap();
        assert_eq!(geometry.coordinates.len(), 4);
        assert_eq!(geometry.coordinates.first(), geometry.coordinates.last());
    }
}
