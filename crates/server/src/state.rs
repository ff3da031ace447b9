use std::sync::Arc;

use presale_core::{ClockSync, Config, RoutineSupervisor, SanitizedConfig, Scheduler};

/// Shared application state
pub struct AppState {
    config: Config,
    supervisor: Arc<RoutineSupervisor>,
    /// Absent when clock sync is disabled in config.
    clock: Option<Arc<ClockSync>>,
}

impl AppState {
    pub fn new(
        config: Config,
        supervisor: Arc<RoutineSupervisor>,
        clock: Option<Arc<ClockSync>>,
    ) -> Self {
        Self {
            config,
            supervisor,
            clock,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn supervisor(&self) -> &Arc<RoutineSupervisor> {
        &self.supervisor
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        self.supervisor.scheduler()
    }

    pub fn clock(&self) -> Option<&Arc<ClockSync>> {
        self.clock.as_ref()
    }
}
