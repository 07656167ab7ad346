//! Health and status endpoints

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use super::AppState;

pub const SERVICE_NAME: &str = "routeopt";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp: String,
    geocoder: &'static str,
    routing: &'static str,
    solver: &'static str,
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: chrono::Utc::now().to_rfc3339(),
        geocoder: state.optimizer.resolver().backend_name(),
        routing: state.optimizer.routing_name(),
        solver: state.optimizer.solver_name(),
    })
}

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Route Optimization API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Geocoding cache statistics
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.optimizer.resolver().cache().stats())
}
