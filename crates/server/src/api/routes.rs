use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, routines, scheduler, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Intents
        .route("/tickets", post(tickets::create_ticket))
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/{hash}", delete(tickets::delete_ticket))
        // Routines
        .route("/routines", get(routines::list_routines))
        .route("/routines/{hash}", get(routines::get_routine))
        .route("/routines/{hash}/start", post(routines::start_routine))
        .route("/routines/{hash}/stop", post(routines::stop_routine))
        .route("/supervisor/status", get(routines::supervisor_status))
        // Scheduler and clock
        .route("/scheduler/tasks", get(scheduler::list_tasks))
        .route("/clock", get(scheduler::clock_status))
        .route("/clock/sync", post(scheduler::sync_clock));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
