pub mod clock;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod routine;
pub mod scheduler;
pub mod show_api;
pub mod supervisor;
pub mod testing;
pub mod ticket;
pub mod token;

pub use clock::{
    create_clock_source, ChainedClockSource, ClockError, ClockOffsetSource, ClockReading,
    ClockSync, HttpClockSource, NtpClockSource,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use notify::{create_notifier, GotifyNotifier, NoopNotifier, Notifier, NotifyError};
pub use routine::{
    PurchaseRoutine, RoutineConfig, RoutineError, RoutineReport, RoutineState, RoutineStatus,
};
pub use scheduler::{Scheduler, TaskCallback, TaskState, TaskStatus};
pub use show_api::{HttpShowClient, ShowApi, ShowApiError};
pub use supervisor::{
    AddOutcome, RegisteredTicket, RoutineSupervisor, SupervisorError, SupervisorStatus,
};
pub use ticket::{SqliteTicketStore, TicketBuyer, TicketEntry, TicketError, TicketStore};
pub use token::TokenGenerator;
