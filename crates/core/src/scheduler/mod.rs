//! Clock-offset-aware one-shot task scheduler.
//!
//! Each task fires once at `target + global_offset`. Changing the offset
//! shifts every armed task without restarting its wait.

mod dynamic;
mod types;

pub use dynamic::Scheduler;
pub use types::{TaskCallback, TaskState, TaskStatus};
