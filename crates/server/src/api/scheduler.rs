//! Scheduler and clock sync handlers.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use presale_core::TaskStatus;

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    /// Shift applied to every target time.
    pub offset_ms: i64,
    pub tasks: Vec<TaskStatus>,
}

/// Clock sync status response
#[derive(Debug, Serialize)]
pub struct ClockStatusResponse {
    /// Whether clock sync is configured
    pub enabled: bool,
    pub running: bool,
    /// Authority time minus local time, from the last successful sync.
    pub offset_ms: Option<i64>,
    pub synced_at: Option<DateTime<Utc>>,
    pub failures: u64,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub offset_ms: i64,
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<TaskListResponse> {
    let scheduler = state.scheduler();
    Json(TaskListResponse {
        offset_ms: scheduler.global_offset().await.num_milliseconds(),
        tasks: scheduler.task_status().await,
    })
}

pub async fn clock_status(State(state): State<Arc<AppState>>) -> Json<ClockStatusResponse> {
    match state.clock() {
        Some(clock) => {
            let reading = clock.reading().await;
            Json(ClockStatusResponse {
                enabled: true,
                running: clock.is_running(),
                offset_ms: reading.map(|r| r.offset_ms),
                synced_at: reading.map(|r| r.synced_at),
                failures: clock.failure_count(),
            })
        }
        None => Json(ClockStatusResponse {
            enabled: false,
            running: false,
            offset_ms: None,
            synced_at: None,
            failures: 0,
        }),
    }
}

/// Sync against the time authority now.
pub async fn sync_clock(State(state): State<Arc<AppState>>) -> Result<Json<SyncResponse>, ApiError> {
    let Some(clock) = state.clock() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Clock sync not enabled",
        ));
    };

    let offset = clock
        .sync_once()
        .await
        .map_err(|e| error_response(StatusCode::BAD_GATEWAY, e))?;

    Ok(Json(SyncResponse {
        offset_ms: offset.num_milliseconds(),
    }))
}
