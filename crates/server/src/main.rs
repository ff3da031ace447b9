use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presale_core::{
    create_clock_source, create_notifier, load_config, validate_config, ClockSync,
    HttpShowClient, Notifier, RoutineSupervisor, Scheduler, ShowApi, SqliteTicketStore,
    TicketStore,
};
use presale_server::api::create_router;
use presale_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PRESALE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    if config.show_api.cookie.as_deref().unwrap_or_default().is_empty() {
        warn!("No session cookie configured, order submissions will be rejected");
    }

    // Intent store
    let ticket_store: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    info!("Ticket store initialized");

    // Ticketing API client
    let show_api: Arc<dyn ShowApi> = Arc::new(
        HttpShowClient::new(&config.show_api).context("Failed to create ticketing API client")?,
    );
    info!("Ticketing API client targets {}", config.show_api.base_url);

    let notifier = create_notifier(&config.notify).context("Failed to create notifier")?;
    info!("Using notifier: {}", notifier.name());

    let scheduler = Arc::new(Scheduler::new());

    // Clock sync starts before intents are armed
    let clock_sync = if config.clock.enabled {
        let source =
            create_clock_source(&config.clock).context("Failed to create clock source")?;
        info!("Clock sync enabled with {} source(s)", source.len());
        let sync = Arc::new(ClockSync::new(
            Arc::new(source),
            Arc::clone(&scheduler),
            Duration::from_secs(config.clock.sync_interval_secs),
        ));
        sync.start();
        Some(sync)
    } else {
        info!("Clock sync disabled in config");
        None
    };

    // Supervisor
    let supervisor = Arc::new(RoutineSupervisor::new(
        config.supervisor.clone(),
        config.routine.clone(),
        Arc::clone(&scheduler),
        ticket_store,
        show_api,
        notifier,
    ));
    let loaded = supervisor
        .start()
        .await
        .context("Failed to start routine supervisor")?;
    info!("Routine supervisor started with {} intent(s)", loaded);

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&supervisor),
        clock_sync.clone(),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    info!("Stopping routine supervisor...");
    supervisor.shutdown().await;
    info!("Routine supervisor stopped");

    if let Some(ref sync) = clock_sync {
        sync.stop();
        info!("Clock sync stopped");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
