//! Error response types

use serde::{Deserialize, Serialize};

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors
    InvalidInput,
    InvalidCoordinates,
    InvalidDepotIndex,
    InsufficientStops,
    TooManyStops,

    // Geocoding errors
    GeocodingFailed,
    GeocodingTimeout,
    GeocodingServiceError,

    // Solver errors
    SolverFailed,
    SolverTimeout,
    SolverNoSolution,
    InternalError,

    // Routing service errors
    RoutingServiceUnavailable,
    RoutingServiceTimeout,
    RoutingServiceError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidCoordinates => "INVALID_COORDINATES",
            ErrorCode::InvalidDepotIndex => "INVALID_DEPOT_INDEX",
            ErrorCode::InsufficientStops => "INSUFFICIENT_STOPS",
            ErrorCode::TooManyStops => "TOO_MANY_STOPS",
            ErrorCode::GeocodingFailed => "GEOCODING_FAILED",
            ErrorCode::GeocodingTimeout => "GEOCODING_TIMEOUT",
            ErrorCode::GeocodingServiceError => "GEOCODING_SERVICE_ERROR",
            ErrorCode::SolverFailed => "SOLVER_FAILED",
            ErrorCode::SolverTimeout => "SOLVER_TIMEOUT",
            ErrorCode::SolverNoSolution => "SOLVER_NO_SOLUTION",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::RoutingServiceUnavailable => "ROUTING_SERVICE_UNAVAILABLE",
            ErrorCode::RoutingServiceTimeout => "ROUTING_SERVICE_TIMEOUT",
            ErrorCode::RoutingServiceError => "ROUTING_SERVICE_ERROR",
        }
    }

    /// HTTP status the presentation layer answers with
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::InvalidCoordinates
            | ErrorCode::InvalidDepotIndex
            | ErrorCode::InsufficientStops
            | ErrorCode::TooManyStops
            | ErrorCode::GeocodingFailed => 400,
            ErrorCode::GeocodingTimeout => 504,
            ErrorCode::GeocodingServiceError
            | ErrorCode::RoutingServiceUnavailable
            | ErrorCode::RoutingServiceTimeout
            | ErrorCode::RoutingServiceError => 503,
            ErrorCode::SolverFailed
            | ErrorCode::SolverTimeout
            | ErrorCode::SolverNoSolution
            | ErrorCode::InternalError => 500,
        }
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "The request contains invalid input data",
            ErrorCode::InvalidCoordinates => "One or more coordinates are invalid",
            ErrorCode::InvalidDepotIndex => "The specified depot index is out of bounds",
            ErrorCode::InsufficientStops => "At least 2 stops are required for route optimization",
            ErrorCode::TooManyStops => "Too many stops provided - maximum limit exceeded",
            ErrorCode::GeocodingFailed => "Failed to geocode one or more addresses",
            ErrorCode::GeocodingTimeout => "Geocoding service request timed out",
            ErrorCode::GeocodingServiceError => "Geocoding service encountered an error",
            ErrorCode::SolverFailed => "The optimization solver encountered an error",
            ErrorCode::SolverTimeout => "The optimization solver timed out before finding a solution",
            ErrorCode::SolverNoSolution => "The optimization solver could not find a valid solution",
            ErrorCode::InternalError => "An unexpected internal error occurred",
            ErrorCode::RoutingServiceUnavailable => "The routing service is currently unavailable",
            ErrorCode::RoutingServiceTimeout => "The routing service request timed out",
            ErrorCode::RoutingServiceError => "The routing service returned an error",
        }
    }

    pub const fn suggestion(self) -> Option<&'static str> {
        match self {
            ErrorCode::InvalidInput => {
                Some("Give every stop either an 'address' or both 'latitude' and 'longitude'")
            }
            ErrorCode::InvalidCoordinates => {
                Some("Ensure latitude is between -90 and 90, longitude is between -180 and 180")
            }
            ErrorCode::InvalidDepotIndex => {
                Some("Ensure depot_index is between 0 and the number of stops minus 1")
            }
            ErrorCode::InsufficientStops => Some("Provide at least 2 stops in the 'stops' array"),
            ErrorCode::TooManyStops => Some("Reduce the number of stops and split the route into several requests"),
            ErrorCode::GeocodingFailed => Some(
                "Provide more specific addresses with street, city, state, and ZIP code, or use coordinates directly",
            ),
            ErrorCode::GeocodingTimeout => {
                Some("Try again or provide coordinates directly instead of addresses")
            }
            ErrorCode::GeocodingServiceError => Some("Try again later or provide coordinates directly"),
            ErrorCode::SolverTimeout => {
                Some("Try reducing the number of stops or increasing the solver timeout")
            }
            ErrorCode::SolverNoSolution => {
                Some("Check that all stops are reachable by road and coordinates are valid")
            }
            ErrorCode::SolverFailed | ErrorCode::InternalError => {
                Some("Please try again. If the problem persists, contact support")
            }
            ErrorCode::RoutingServiceUnavailable => Some(
                "Try again in a few moments. If the issue persists, the routing service may be down",
            ),
            ErrorCode::RoutingServiceTimeout => {
                Some("Try again with fewer stops or check your network connection")
            }
            ErrorCode::RoutingServiceError => Some("Check that all stops are reachable by road"),
        }
    }
}

/// Pipeline stage at which a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Geocoding,
    DistanceMatrix,
    Solving,
    Response,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Geocoding => "geocoding",
            Stage::DistanceMatrix => "distance_matrix",
            Stage::Solving => "solving",
            Stage::Response => "response",
        }
    }
}

/// Detailed information about one offending field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Structured error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always true for error responses
    pub error: bool,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub stage: Stage,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, stage: Stage) -> Self {
        Self {
            error: true,
            code,
            message: code.default_message().to_string(),
            details: vec![],
            suggestion: code.suggestion().map(str::to_string),
            stage,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }
}
