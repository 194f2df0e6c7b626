pub mod allocation;
pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod priority_index;
pub mod scheduler;
pub mod scoring;
pub mod seed;
pub mod tokens;
pub mod triage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Wire up the service and run until interrupted.
pub async fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("MediQ starting v{}", config::APP_VERSION);

    let settings = config::Settings::from_env();
    if let Some(dir) = settings.db_path.parent() {
        std::fs::create_dir_all(dir).expect("Cannot create data directory");
    }

    let conn = db::open_database(&settings.db_path).expect("Cannot open queue database");
    seed::seed_if_empty(&conn).expect("Seeding failed");

    let orchestrator = Arc::new(
        orchestrator::QueueOrchestrator::new(
            conn,
            notify::Notifier::new(),
            settings.avg_consult_minutes,
        )
        .expect("Cannot initialise queue orchestrator"),
    );

    let scheduler = scheduler::start(orchestrator.clone(), &settings);

    let classifier = Arc::new(triage::UrgencyClassifier::new(&settings));
    let ctx = api::ApiContext::new(orchestrator, classifier);
    let mut server = api::start_api_server(ctx, settings.bind_addr)
        .await
        .expect("Cannot start API server");

    tracing::info!(addr = %server.addr, "MediQ ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    tracing::info!("Shutting down");
    server.shutdown();
    scheduler.shutdown();
}
