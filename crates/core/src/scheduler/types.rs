//! Scheduler types.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

/// Callback run when a task fires. Invoked at most once, on its own task.
pub type TaskCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Lifecycle of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its fire time.
    Armed,
    /// Callback dispatched. Never re-armed.
    Fired,
    /// Removed before firing.
    Cancelled,
}

/// Read-only view of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub id: String,
    /// Target time on the authority clock.
    pub original_time: DateTime<Utc>,
    /// Target time shifted by the current global offset.
    pub adjusted_time: DateTime<Utc>,
    /// Time left until the adjusted time, zero once due.
    pub remaining_ms: u64,
    pub running: bool,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<DateTime<Utc>>,
}
