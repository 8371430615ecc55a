//! ShipWatch control service entry point
//!
//! Runs the reconciliation loop as a standalone process: the web layer
//! writes the desired-state flag, this process converges the simulation
//! runtime onto it and keeps it converged across restarts.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shipwatch::config::Config;
use shipwatch::db;
use shipwatch::risk::{HeuristicAnalyzer, RiskAnalyzer};
use shipwatch::sim::ledger::ActivityLedger;
use shipwatch::sim::manager::SimulationManager;
use shipwatch::sim::reconcile::Reconciler;
use shipwatch::sim::runner::TelemetryRunner;
use shipwatch::store::{ControlStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("ShipWatch control service starting...");
    tracing::info!(
        "Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Wire the control core
    let store: Arc<dyn ControlStore> = Arc::new(PgStore::new(pool));
    let ledger = Arc::new(ActivityLedger::new(config.ledger_capacity));
    let analyzer: Arc<dyn RiskAnalyzer> = Arc::new(HeuristicAnalyzer);
    tracing::info!(analyzer = analyzer.name(), "risk analyzer ready");

    let runner = Arc::new(TelemetryRunner::new(
        store.clone(),
        analyzer,
        ledger.clone(),
    ));
    let manager = Arc::new(SimulationManager::new(
        runner,
        ledger.clone(),
        config.tick_interval,
        config.dedupe_window,
    ));

    // The boot pass inside the loop resumes a previously-active simulation
    let reconciler = Reconciler::new(store.clone(), manager.clone(), config.poll_interval);
    let reconciler_handle = reconciler.spawn();

    tracing::info!(
        poll_secs = config.poll_interval.as_secs(),
        tick_secs = config.tick_interval.as_secs(),
        "ShipWatch control service running"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    reconciler_handle.stop().await;
    manager.shutdown().await;

    Ok(())
}
