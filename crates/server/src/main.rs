mod api;
mod bootstrap;
mod enrichment;
mod generator;
mod health;
mod scheduler;

use std::sync::Arc;

use anyhow::Result;
use mandi_core::config::{AppConfig, LoadOptions};

use crate::enrichment::EnrichmentService;
use crate::generator::RecommendationGenerator;
use crate::scheduler::{BatchScheduler, SchedulerStatus};

fn init_logging(config: &AppConfig) {
    use mandi_core::config::LogFormat::*;
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins when set; otherwise the configured level applies, with
    // sqlx statement logging held at warn so batch runs stay readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},sqlx=warn", config.logging.level))
    });

    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);
    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::Application::assemble(config).await?;

    let scheduler_status = SchedulerStatus::default();
    health::spawn(&app.config, app.db_pool.clone(), scheduler_status.clone()).await?;

    let generator =
        Arc::new(RecommendationGenerator::from_pool(app.db_pool.clone(), app.config.recs.clone()));
    let enrichment =
        Arc::new(EnrichmentService::from_pool(app.db_pool.clone(), &app.config.scoring)?);

    let router = api::router(
        app.db_pool.clone(),
        generator.clone(),
        enrichment,
        app.config.scoring.default_count,
    );
    let api_address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&api_address).await?;
    tracing::info!(
        event_name = "system.api.start",
        correlation_id = "bootstrap",
        bind_address = %api_address,
        "recommendation api started"
    );
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            tracing::error!(
                event_name = "system.api.error",
                correlation_id = "bootstrap",
                error = %error,
                "recommendation api server terminated unexpectedly"
            );
        }
    });

    let scheduler_handle = BatchScheduler::from_pool(
        app.db_pool.clone(),
        generator,
        &app.config.recs,
        scheduler_status,
    )
    .spawn();
    tracing::info!(
        event_name = "system.scheduler.start",
        correlation_id = "bootstrap",
        interval_secs = app.config.recs.batch_interval_secs,
        "batch recommendation scheduler started"
    );

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "mandi-server started"
    );
    tokio::signal::ctrl_c().await?;

    scheduler_handle.abort();
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "mandi-server stopping"
    );

    Ok(())
}
