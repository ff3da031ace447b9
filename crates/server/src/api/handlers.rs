use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use presale_core::{RoutineError, SanitizedConfig, SupervisorError, SupervisorStatus};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub supervisor: SupervisorStatus,
}

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Map a supervisor error to its HTTP status.
pub fn supervisor_error(err: SupervisorError) -> ApiError {
    let status = match &err {
        SupervisorError::NotFound(_) => StatusCode::NOT_FOUND,
        SupervisorError::Expired(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SupervisorError::Routine(RoutineError::AlreadyFinished { .. })
        | SupervisorError::Routine(RoutineError::StillStopping(_))
        | SupervisorError::Routine(RoutineError::Retired(_)) => StatusCode::CONFLICT,
        SupervisorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        supervisor: state.supervisor().summary().await,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus scrape endpoint.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
