//! Per-intent purchase state machine.
//!
//! States: `Idle -> Resolving -> TokenAcquired -> Submitting -> Retrying ...`
//! until one of the terminal states `Success`, `Failed` or `Error`.

mod config;
mod runner;
mod types;

pub use config::RoutineConfig;
pub use runner::PurchaseRoutine;
pub use types::{RoutineError, RoutineReport, RoutineState, RoutineStatus};
