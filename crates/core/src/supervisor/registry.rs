//! Routine supervisor implementation.
//!
//! Owns one purchase routine per intent, keyed by content hash:
//! - Registration: persist the intent, create the routine, arm its scheduler task
//! - Control: force start, stop, remove
//! - Retirement: on any terminal report the intent is dropped for good

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::metrics::{INTENTS_REGISTERED, NOTIFICATIONS};
use crate::notify::Notifier;
use crate::routine::{
    PurchaseRoutine, RoutineConfig, RoutineError, RoutineReport, RoutineState, RoutineStatus,
};
use crate::scheduler::{Scheduler, TaskCallback};
use crate::show_api::ShowApi;
use crate::ticket::{TicketEntry, TicketStore};

use super::types::{AddOutcome, RegisteredTicket, SupervisorError, SupervisorStatus};

/// Capacity of the terminal-report channel.
const REPORT_BUFFER: usize = 64;

type RoutineMap = Arc<RwLock<HashMap<String, Arc<PurchaseRoutine>>>>;

/// Owns every purchase routine and wires each to the scheduler.
pub struct RoutineSupervisor {
    config: SupervisorConfig,
    routine_config: RoutineConfig,
    scheduler: Arc<Scheduler>,
    store: Arc<dyn TicketStore>,
    api: Arc<dyn ShowApi>,
    notifier: Arc<dyn Notifier>,

    // Runtime state
    routines: RoutineMap,
    report_tx: mpsc::Sender<RoutineReport>,
    report_rx: Mutex<Option<mpsc::Receiver<RoutineReport>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RoutineSupervisor {
    pub fn new(
        config: SupervisorConfig,
        routine_config: RoutineConfig,
        scheduler: Arc<Scheduler>,
        store: Arc<dyn TicketStore>,
        api: Arc<dyn ShowApi>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (report_tx, report_rx) = mpsc::channel(REPORT_BUFFER);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            routine_config,
            scheduler,
            store,
            api,
            notifier,
            routines: Arc::new(RwLock::new(HashMap::new())),
            report_tx,
            report_rx: Mutex::new(Some(report_rx)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Start retiring finished routines and register every persisted intent.
    /// Returns how many intents were loaded.
    pub async fn start(&self) -> Result<usize, SupervisorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Supervisor already running");
            return Ok(0);
        }

        info!("Starting routine supervisor");
        self.spawn_reaper().await;
        self.load_persisted().await
    }

    /// Register every unexpired intent from the store.
    pub async fn load_persisted(&self) -> Result<usize, SupervisorError> {
        let entries = self.store.list_active(Utc::now())?;
        let mut loaded = 0;
        for entry in entries {
            if self.register(entry).await {
                loaded += 1;
            }
        }
        info!(loaded, "Persisted intents registered");
        Ok(loaded)
    }

    /// Add a new intent. Equal intents (same project, sku, screen and buyer)
    /// collapse to one routine.
    pub async fn add_ticket(&self, entry: TicketEntry) -> Result<AddOutcome, SupervisorError> {
        let hash = entry.content_hash();
        if entry.is_expired(Utc::now()) {
            return Err(SupervisorError::Expired(hash));
        }

        if self.routines.read().await.contains_key(&hash) {
            debug!(ticket = %hash, "Intent already registered");
            return Ok(AddOutcome::Duplicate { hash });
        }

        let inserted = self.store.add(&entry)?;
        let registered = self.register(entry).await;
        if inserted || registered {
            Ok(AddOutcome::Added { hash })
        } else {
            Ok(AddOutcome::Duplicate { hash })
        }
    }

    /// Create the routine and its scheduler task. Returns `false` if a routine
    /// for this intent already exists.
    async fn register(&self, entry: TicketEntry) -> bool {
        let hash = entry.content_hash();
        let sale_start = entry.sale_start;

        let routine = {
            let mut routines = self.routines.write().await;
            if routines.contains_key(&hash) {
                return false;
            }
            let routine = Arc::new(
                PurchaseRoutine::new(entry, Arc::clone(&self.api), self.routine_config.clone())
                    .with_report_channel(self.report_tx.clone()),
            );
            routines.insert(hash.clone(), Arc::clone(&routine));
            INTENTS_REGISTERED.set(routines.len() as i64);
            routine
        };

        info!(
            ticket = %hash,
            intent = %routine.ticket().label(),
            buyer = %routine.ticket().buyer,
            sale_start = %sale_start,
            "Intent registered"
        );

        if self.config.auto_schedule {
            self.scheduler
                .add_task(hash, sale_start, start_callback(routine))
                .await;
        }
        true
    }

    /// Start a routine now, regardless of its scheduled time.
    /// Returns `false` if it was already running.
    pub async fn force_start(&self, hash: &str) -> Result<bool, SupervisorError> {
        let routine = self.routine(hash).await?;
        let started = routine.start().await?;
        if started {
            info!(ticket = %hash, "Routine force-started");
        }
        Ok(started)
    }

    /// Stop a running routine. Its scheduler task, if still armed, stays armed.
    pub async fn stop_routine(&self, hash: &str) -> Result<bool, SupervisorError> {
        let routine = self.routine(hash).await?;
        Ok(routine.stop().await)
    }

    /// Stop the routine, cancel its task and forget the intent.
    pub async fn remove_ticket(&self, hash: &str) -> Result<(), SupervisorError> {
        let routine = {
            let mut routines = self.routines.write().await;
            let routine = routines.remove(hash);
            INTENTS_REGISTERED.set(routines.len() as i64);
            routine
        };

        self.scheduler.remove_task(hash).await;
        let removed = self.store.remove(hash)?;

        match routine {
            Some(routine) => {
                routine.retire().await;
                info!(ticket = %hash, "Intent removed");
                Ok(())
            }
            None if removed => {
                info!(ticket = %hash, "Unregistered intent removed from store");
                Ok(())
            }
            None => Err(SupervisorError::NotFound(hash.to_string())),
        }
    }

    pub async fn status(&self, hash: &str) -> Result<RoutineStatus, SupervisorError> {
        Ok(self.routine(hash).await?.status().await)
    }

    /// Status of every routine, ordered by hash.
    pub async fn statuses(&self) -> Vec<RoutineStatus> {
        let routines: Vec<_> = self.routines.read().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(routines.len());
        for routine in routines {
            statuses.push(routine.status().await);
        }
        statuses.sort_by(|a, b| a.hash.cmp(&b.hash));
        statuses
    }

    /// Registered intents, ordered by sale start.
    pub async fn tickets(&self) -> Vec<RegisteredTicket> {
        let routines: Vec<_> = self.routines.read().await.values().cloned().collect();
        let mut tickets = Vec::with_capacity(routines.len());
        for routine in routines {
            tickets.push(RegisteredTicket {
                hash: routine.hash().to_string(),
                ticket: routine.ticket().clone(),
                armed: self.scheduler.is_armed(routine.hash()).await,
                running: routine.is_running(),
            });
        }
        tickets.sort_by_key(|t| t.ticket.sale_start);
        tickets
    }

    pub async fn summary(&self) -> SupervisorStatus {
        let routines: Vec<_> = self.routines.read().await.values().cloned().collect();
        let armed_tasks = self
            .scheduler
            .task_status()
            .await
            .iter()
            .filter(|t| t.running)
            .count();

        SupervisorStatus {
            running: self.running.load(Ordering::Relaxed),
            routines: routines.len(),
            running_routines: routines.iter().filter(|r| r.is_running()).count(),
            armed_tasks,
        }
    }

    /// Cancel pending tasks, stop every routine and wait for them to exit.
    /// Intents stay persisted for the next start.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping routine supervisor");

        let routines: Vec<_> = self.routines.read().await.values().cloned().collect();
        for routine in &routines {
            self.scheduler.remove_task(routine.hash()).await;
            routine.retire().await;
        }
        for routine in &routines {
            routine.wait().await;
        }

        let _ = self.shutdown_tx.send(());
        info!(routines = routines.len(), "Routine supervisor stopped");
    }

    async fn routine(&self, hash: &str) -> Result<Arc<PurchaseRoutine>, SupervisorError> {
        self.routines
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| SupervisorError::NotFound(hash.to_string()))
    }

    async fn spawn_reaper(&self) {
        let Some(mut report_rx) = self.report_rx.lock().await.take() else {
            warn!("Report channel already taken, finished routines will not be retired");
            return;
        };

        let routines = Arc::clone(&self.routines);
        let scheduler = Arc::clone(&self.scheduler);
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            debug!("Reaper started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    report = report_rx.recv() => {
                        let Some(report) = report else { break };
                        retire(report, &routines, &scheduler, store.as_ref(), &notifier).await;
                    }
                }
            }
            debug!("Reaper stopped");
        });
    }
}

/// Scheduler callback for a routine: start it unless a force start got there first.
fn start_callback(routine: Arc<PurchaseRoutine>) -> TaskCallback {
    Arc::new(move || {
        let routine = Arc::clone(&routine);
        async move {
            if routine.is_running() {
                debug!(ticket = %routine.hash(), "Routine already running at fire time");
                return;
            }
            match routine.start().await {
                Ok(true) => info!(ticket = %routine.hash(), "Routine started on schedule"),
                Ok(false) => {}
                Err(RoutineError::Retired(_)) => {
                    debug!(ticket = %routine.hash(), "Intent removed before scheduled start")
                }
                Err(e) => warn!(ticket = %routine.hash(), error = %e, "Scheduled start refused"),
            }
        }
        .boxed()
    })
}

/// Drop a finished intent: routine, task and persisted entry.
async fn retire(
    report: RoutineReport,
    routines: &RoutineMap,
    scheduler: &Scheduler,
    store: &dyn TicketStore,
    notifier: &Arc<dyn Notifier>,
) {
    let hash = report.hash;
    let routine = {
        let mut routines = routines.write().await;
        let routine = routines.remove(&hash);
        INTENTS_REGISTERED.set(routines.len() as i64);
        routine
    };
    scheduler.remove_task(&hash).await;

    if let Err(e) = store.remove(&hash) {
        error!(ticket = %hash, error = %e, "Failed to remove retired intent");
    }

    info!(ticket = %hash, state = %report.state, "Intent retired");

    let Some(routine) = routine else {
        return;
    };
    routine.retire().await;
    let (title, message) = outcome_message(routine.ticket(), &report.state);
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        match notifier.notify(&title, &message).await {
            Ok(()) => {
                NOTIFICATIONS
                    .with_label_values(&[notifier.name(), "success"])
                    .inc();
            }
            Err(e) => {
                NOTIFICATIONS
                    .with_label_values(&[notifier.name(), "error"])
                    .inc();
                warn!(ticket = %hash, error = %e, "Failed to send notification");
            }
        }
    });
}

fn outcome_message(ticket: &TicketEntry, state: &RoutineState) -> (String, String) {
    let what = if ticket.project_name.is_empty() {
        ticket.label()
    } else {
        format!("{} {} {}", ticket.project_name, ticket.screen_name, ticket.sku_name)
            .trim()
            .to_string()
    };

    let title = match state {
        RoutineState::Success { .. } => "Purchase succeeded",
        _ => "Purchase failed",
    };
    (
        title.to_string(),
        format!("{} for {}: {}", what, ticket.buyer, state),
    )
}
