//! Purchase routine control handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use presale_core::{RoutineStatus, SupervisorStatus};

use super::handlers::{supervisor_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ListRoutinesResponse {
    pub routines: Vec<RoutineStatus>,
    pub total: usize,
}

/// Result of a start or stop request
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub hash: String,
    /// False when the routine was already in the requested condition.
    pub changed: bool,
    pub status: RoutineStatus,
}

pub async fn list_routines(State(state): State<Arc<AppState>>) -> Json<ListRoutinesResponse> {
    let routines = state.supervisor().statuses().await;
    Json(ListRoutinesResponse {
        total: routines.len(),
        routines,
    })
}

pub async fn get_routine(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<RoutineStatus>, ApiError> {
    state
        .supervisor()
        .status(&hash)
        .await
        .map(Json)
        .map_err(supervisor_error)
}

/// Start a routine now, ahead of its scheduled time.
pub async fn start_routine(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<ControlResponse>, ApiError> {
    let supervisor = state.supervisor();
    let changed = supervisor
        .force_start(&hash)
        .await
        .map_err(supervisor_error)?;
    let status = supervisor.status(&hash).await.map_err(supervisor_error)?;

    Ok(Json(ControlResponse {
        hash,
        changed,
        status,
    }))
}

/// Stop a running routine. It can be started again later.
pub async fn stop_routine(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<ControlResponse>, ApiError> {
    let supervisor = state.supervisor();
    let changed = supervisor
        .stop_routine(&hash)
        .await
        .map_err(supervisor_error)?;
    let status = supervisor.status(&hash).await.map_err(supervisor_error)?;

    Ok(Json(ControlResponse {
        hash,
        changed,
        status,
    }))
}

pub async fn supervisor_status(State(state): State<Arc<AppState>>) -> Json<SupervisorStatus> {
    Json(state.supervisor().summary().await)
}
