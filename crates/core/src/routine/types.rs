//! Types for the purchase routine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by routine control calls.
#[derive(Debug, Error)]
pub enum RoutineError {
    /// The routine already reached a terminal state.
    #[error("routine {hash} already finished: {state}")]
    AlreadyFinished { hash: String, state: String },

    /// A previous run was stopped but has not exited its current iteration yet.
    #[error("routine {0} is still stopping")]
    StillStopping(String),

    /// The intent was removed or retired; the routine cannot run again.
    #[error("routine {0} was retired")]
    Retired(String),
}

/// Purchase routine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutineState {
    /// Not started yet.
    Idle,
    /// Fetching project metadata and locating the SKU.
    Resolving,
    /// A purchase-token round completed.
    TokenAcquired,
    /// Submitting an order.
    Submitting,
    /// Waiting before the next submission.
    Retrying,
    /// Order placed.
    Success { order_id: i64 },
    /// Business outcome that ends the attempt (not sellable, window closed).
    Failed { reason: String },
    /// The intent cannot be resolved (bad project, SKU or buyer reference).
    Error { reason: String },
    /// Stopped from outside; can be started again.
    Cancelled,
}

impl RoutineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RoutineState::Success { .. } | RoutineState::Failed { .. } | RoutineState::Error { .. }
        )
    }

    /// State name for display and metrics labels.
    pub fn label(&self) -> &'static str {
        match self {
            RoutineState::Idle => "idle",
            RoutineState::Resolving => "resolving",
            RoutineState::TokenAcquired => "token_acquired",
            RoutineState::Submitting => "submitting",
            RoutineState::Retrying => "retrying",
            RoutineState::Success { .. } => "success",
            RoutineState::Failed { .. } => "failed",
            RoutineState::Error { .. } => "error",
            RoutineState::Cancelled => "cancelled",
        }
    }
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IterationOutcome {
    Retry,
    Success(i64),
    Failed(String),
    Error(String),
}

/// Observable snapshot of a routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineStatus {
    pub hash: String,
    pub project_id: i64,
    pub sku_id: i64,
    pub screen_id: i64,
    pub state: RoutineState,
    pub running: bool,
    /// Order submissions across all runs.
    pub attempts: u32,
    /// Purchase-token rounds across all runs.
    pub token_rounds: u32,
    pub last_code: Option<i64>,
    pub last_message: Option<String>,
    /// Price used for the next submission, once resolved.
    pub price: Option<i64>,
    pub order_id: Option<i64>,
    /// Accepted codes that came back without an order id.
    pub ambiguous_acceptances: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RoutineStatus {
    pub fn new(hash: String, project_id: i64, sku_id: i64, screen_id: i64) -> Self {
        Self {
            hash,
            project_id,
            sku_id,
            screen_id,
            state: RoutineState::Idle,
            running: false,
            attempts: 0,
            token_rounds: 0,
            last_code: None,
            last_message: None,
            price: None,
            order_id: None,
            ambiguous_acceptances: 0,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Sent to the owner when a routine reaches a terminal state.
#[derive(Debug, Clone)]
pub struct RoutineReport {
    pub hash: String,
    pub state: RoutineState,
    pub status: RoutineStatus,
}

impl std::fmt::Display for RoutineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutineState::Success { order_id } => write!(f, "success (order {})", order_id),
            RoutineState::Failed { reason } => write!(f, "failed: {}", reason),
            RoutineState::Error { reason } => write!(f, "error: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RoutineState::Success { order_id: 1 }.is_terminal());
        assert!(RoutineState::Failed {
            reason: "x".to_string()
        }
        .is_terminal());
        assert!(RoutineState::Error {
            reason: "x".to_string()
        }
        .is_terminal());
        assert!(!RoutineState::Cancelled.is_terminal());
        assert!(!RoutineState::Retrying.is_terminal());
        assert!(!RoutineState::Idle.is_terminal());
    }

    #[test]
    fn test_state_serialization() {
        let state = RoutineState::Success { order_id: 999 };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"type\":\"success\""));
        assert!(json.contains("\"order_id\":999"));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            RoutineState::Success { order_id: 5 }.to_string(),
            "success (order 5)"
        );
        assert_eq!(RoutineState::Retrying.to_string(), "retrying");
    }
}
