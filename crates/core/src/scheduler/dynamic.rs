//! Scheduler implementation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::metrics::{TASKS_ARMED, TASKS_FIRED};

use super::types::{TaskCallback, TaskState, TaskStatus};

/// Mutable part of a task, shared with its waiter.
struct TaskSlot {
    state: TaskState,
    deadline: Instant,
    fired_at: Option<DateTime<Utc>>,
}

struct TaskShared {
    slot: Mutex<TaskSlot>,
    /// Wakes the waiter after a reprogram or cancel.
    wake: Notify,
}

struct ScheduledTask {
    target_time: DateTime<Utc>,
    /// Wall-clock and monotonic readings taken together when the task was added.
    anchor_at: DateTime<Utc>,
    anchor: Instant,
    shared: Arc<TaskShared>,
}

impl ScheduledTask {
    /// Monotonic deadline for `target + offset`, measured from the anchor so
    /// that elapsed wait is never lost when the offset changes.
    fn deadline_for(&self, offset: Duration) -> Instant {
        deadline_from(self.target_time, offset, self.anchor_at, self.anchor)
    }
}

fn deadline_from(
    target: DateTime<Utc>,
    offset: Duration,
    anchor_at: DateTime<Utc>,
    anchor: Instant,
) -> Instant {
    match (target + offset - anchor_at).to_std() {
        Ok(wait) => anchor + wait,
        // already due
        Err(_) => anchor,
    }
}

struct SchedulerInner {
    tasks: HashMap<String, ScheduledTask>,
    offset: Duration,
}

/// One-shot scheduler with a global clock offset.
///
/// Add, remove and offset changes are serialized by a single lock over the
/// task table. Each armed task has its own waiter; firing is claimed under
/// the task's slot lock so a task fires at most once.
pub struct Scheduler {
    inner: RwLock<SchedulerInner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SchedulerInner {
                tasks: HashMap::new(),
                offset: Duration::zero(),
            }),
        }
    }

    /// Arm a task firing at `target + global_offset`.
    ///
    /// Returns `false` without changes if a task with this id is still armed.
    /// A task whose fire time has already passed fires immediately, on its
    /// own task.
    pub async fn add_task(
        &self,
        id: impl Into<String>,
        target: DateTime<Utc>,
        callback: TaskCallback,
    ) -> bool {
        let id = id.into();
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.tasks.get(&id) {
            if existing.shared.slot.lock().await.state == TaskState::Armed {
                debug!(task = %id, "Task already armed, ignoring");
                return false;
            }
        }

        let anchor_at = Utc::now();
        let anchor = Instant::now();
        let deadline = deadline_from(target, inner.offset, anchor_at, anchor);
        let shared = Arc::new(TaskShared {
            slot: Mutex::new(TaskSlot {
                state: TaskState::Armed,
                deadline,
                fired_at: None,
            }),
            wake: Notify::new(),
        });

        tokio::spawn(wait_and_fire(id.clone(), Arc::clone(&shared), callback));

        info!(
            task = %id,
            target = %target,
            adjusted = %(target + inner.offset),
            "Task armed"
        );

        inner.tasks.insert(
            id,
            ScheduledTask {
                target_time: target,
                anchor_at,
                anchor,
                shared,
            },
        );
        TASKS_ARMED.inc();
        true
    }

    /// Cancel and forget a task. Returns whether an armed task was cancelled.
    pub async fn remove_task(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(task) = inner.tasks.remove(id) else {
            return false;
        };

        let mut slot = task.shared.slot.lock().await;
        if slot.state != TaskState::Armed {
            return false;
        }
        slot.state = TaskState::Cancelled;
        drop(slot);
        task.shared.wake.notify_one();
        TASKS_ARMED.dec();

        info!(task = %id, "Task cancelled");
        true
    }

    /// Replace the global offset and shift every armed task by the difference.
    pub async fn set_global_offset(&self, offset: Duration) {
        let mut inner = self.inner.write().await;
        let delta = offset - inner.offset;
        inner.offset = offset;

        if delta.is_zero() {
            return;
        }

        let mut shifted = 0usize;
        for task in inner.tasks.values() {
            let mut slot = task.shared.slot.lock().await;
            if slot.state != TaskState::Armed {
                continue;
            }
            slot.deadline = task.deadline_for(offset);
            drop(slot);
            task.shared.wake.notify_one();
            shifted += 1;
        }

        debug!(
            offset_ms = offset.num_milliseconds(),
            delta_ms = delta.num_milliseconds(),
            shifted,
            "Global offset updated"
        );
    }

    pub async fn global_offset(&self) -> Duration {
        self.inner.read().await.offset
    }

    /// Number of tasks in the table, fired ones included until cleanup.
    pub async fn task_count(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    /// Whether the task exists and has not fired yet.
    pub async fn is_armed(&self, id: &str) -> bool {
        let inner = self.inner.read().await;
        match inner.tasks.get(id) {
            Some(task) => task.shared.slot.lock().await.state == TaskState::Armed,
            None => false,
        }
    }

    /// Drop fired tasks from the table. Returns how many were removed.
    pub async fn cleanup_completed_tasks(&self) -> usize {
        let mut inner = self.inner.write().await;
        let mut done = Vec::new();
        for (id, task) in inner.tasks.iter() {
            if task.shared.slot.lock().await.state != TaskState::Armed {
                done.push(id.clone());
            }
        }
        for id in &done {
            inner.tasks.remove(id);
        }
        done.len()
    }

    /// Status of every task, ordered by adjusted time.
    pub async fn task_status(&self) -> Vec<TaskStatus> {
        let inner = self.inner.read().await;
        let now = Instant::now();
        let mut statuses = Vec::with_capacity(inner.tasks.len());

        for (id, task) in inner.tasks.iter() {
            let slot = task.shared.slot.lock().await;
            let running = slot.state == TaskState::Armed;
            let remaining_ms = if running {
                slot.deadline.saturating_duration_since(now).as_millis() as u64
            } else {
                0
            };
            statuses.push(TaskStatus {
                id: id.clone(),
                original_time: task.target_time,
                adjusted_time: task.target_time + inner.offset,
                remaining_ms,
                running,
                state: slot.state,
                fired_at: slot.fired_at,
            });
        }

        statuses.sort_by_key(|s| s.adjusted_time);
        statuses
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a task's deadline, following reprograms, and fires it once.
async fn wait_and_fire(id: String, shared: Arc<TaskShared>, callback: TaskCallback) {
    loop {
        let deadline = {
            let slot = shared.slot.lock().await;
            if slot.state != TaskState::Armed {
                return;
            }
            slot.deadline
        };

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                let mut slot = shared.slot.lock().await;
                if slot.state != TaskState::Armed {
                    return;
                }
                if slot.deadline > Instant::now() {
                    // moved later while we were waking up
                    continue;
                }
                slot.state = TaskState::Fired;
                slot.fired_at = Some(Utc::now());
                drop(slot);

                TASKS_ARMED.dec();
                TASKS_FIRED.inc();
                info!(task = %id, "Task fired");
                tokio::spawn(callback());
                return;
            }
            _ = shared.wake.notified() => {}
        }
    }
}
