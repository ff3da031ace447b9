//! Types for the routine supervisor.

use serde::Serialize;
use thiserror::Error;

use crate::routine::RoutineError;
use crate::ticket::{TicketEntry, TicketError};

/// Errors returned by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// No routine is registered under this hash.
    #[error("intent not found: {0}")]
    NotFound(String),

    /// The intent's attempt window already closed.
    #[error("sale window of intent {0} already closed")]
    Expired(String),

    #[error("intent store error: {0}")]
    Store(#[from] TicketError),

    #[error(transparent)]
    Routine(#[from] RoutineError),
}

/// Result of adding an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AddOutcome {
    /// New intent; a routine was created.
    Added { hash: String },
    /// An equal intent is already registered.
    Duplicate { hash: String },
}

impl AddOutcome {
    pub fn hash(&self) -> &str {
        match self {
            AddOutcome::Added { hash } | AddOutcome::Duplicate { hash } => hash,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, AddOutcome::Added { .. })
    }
}

/// A registered intent as listed by the supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredTicket {
    pub hash: String,
    pub ticket: TicketEntry,
    /// Whether its scheduler task is still waiting to fire.
    pub armed: bool,
    pub running: bool,
}

/// Supervisor summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SupervisorStatus {
    pub running: bool,
    pub routines: usize,
    pub running_routines: usize,
    pub armed_tasks: usize,
}
