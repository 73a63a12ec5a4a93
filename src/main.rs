use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storewatch::api;
use storewatch::config::Config;
use storewatch::ingest;
use storewatch::jobs::{JobRegistry, ReportRunner};
use storewatch::storage::{SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    if config.data.load_on_startup {
        let counts = ingest::load_directory(storage.as_ref(), &config.data.dir)
            .await
            .with_context(|| format!("failed to load data from {}", config.data.dir.display()))?;
        info!(
            "Data loading completed: {} observations, {} business-hour rules, {} time zones across {} stores",
            counts.observations, counts.business_hours, counts.timezones, counts.stores
        );
    } else {
        warn!("LOAD_DATA_ON_STARTUP is off, reporting on previously cached data");
    }

    info!(
        "Reports use default zone {} with {:?} extrapolation",
        config.report.default_timezone, config.report.extrapolation
    );

    let runner = Arc::new(ReportRunner::new(
        Arc::clone(&storage),
        config.report.engine(),
        config.report.output_dir.clone(),
        Arc::new(JobRegistry::new()),
    ));
    let api_router = api::create_api_router(runner);

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - POST http://{}/trigger_report", api_addr);
    info!("   - GET  http://{}/get_report/{{report_id}}", api_addr);

    axum::serve(api_listener, api_router).await?;

    Ok(())
}
