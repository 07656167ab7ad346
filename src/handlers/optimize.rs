//! Route optimization endpoint

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::types::{ErrorCode, ErrorDetail, ErrorResponse, OptimizationRequest, Stage};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// POST /optimize
pub async fn optimize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OptimizationRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("optimize", request_id = %request_id);

    let mut response = handle(state, payload).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn handle(state: Arc<AppState>, payload: Result<Json<OptimizationRequest>, JsonRejection>) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            return ApiError(
                ErrorResponse::new(ErrorCode::InvalidInput, Stage::Validation).with_details(vec![ErrorDetail::new(
                    "body",
                    rejection.body_text(),
                )]),
            )
            .into_response();
        }
    };

    info!(
        "Optimization request: {} stops, depot {}",
        request.stops.len(),
        request.depot_index
    );

    match state.optimizer.optimize(request).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            let body = e.to_response();
            if body.code.http_status() >= 500 {
                error!("Optimization failed at {}: {}", body.stage.as_str(), e);
            } else {
                info!("Optimization rejected at {}: {}", body.stage.as_str(), body.code.as_str());
            }
            ApiError(body).into_response()
        }
    }
}
