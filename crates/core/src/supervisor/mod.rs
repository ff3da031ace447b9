//! Routine supervisor.
//!
//! One purchase routine and one scheduler task per distinct intent, keyed by
//! the intent's content hash. A routine that reaches a terminal state retires
//! its intent: the attempt is single-shot per sale window.

mod registry;
mod types;

pub use registry::RoutineSupervisor;
pub use types::{AddOutcome, RegisteredTicket, SupervisorError, SupervisorStatus};
