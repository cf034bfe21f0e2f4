//! Service health endpoint.
//!
//! Beyond the database probe, `/health` reports the two signals specific to
//! this engine: whether the external scoring service is usably configured,
//! and whether the batch scheduler is still completing runs (a last run
//! older than twice the configured interval reads as stale).

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use mandi_core::config::{AppConfig, ScoringServiceConfig};
use mandi_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

use crate::scheduler::SchedulerStatus;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    scoring: ScoringServiceConfig,
    scheduler: SchedulerStatus,
    batch_interval_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn new(status: &'static str, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub scoring: HealthCheck,
    pub scheduler: HealthCheck,
    pub checked_at: String,
}

pub fn router(
    db_pool: DbPool,
    scoring: ScoringServiceConfig,
    scheduler: SchedulerStatus,
    batch_interval_secs: u64,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { db_pool, scoring, scheduler, batch_interval_secs })
}

pub async fn spawn(
    config: &AppConfig,
    db_pool: DbPool,
    scheduler: SchedulerStatus,
) -> std::io::Result<()> {
    let address = format!("{}:{}", config.server.bind_address, config.server.health_check_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint listening"
    );

    let app = router(db_pool, config.scoring.clone(), scheduler, config.recs.batch_interval_secs);
    tokio::spawn(async move {
        if let Err(serve_error) = axum::serve(listener, app).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %serve_error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let scoring = scoring_check(&state.scoring);
    let scheduler = scheduler_check(&state.scheduler, state.batch_interval_secs);

    let ready =
        database.status == "ready" && scoring.status == "ready" && scheduler.status != "stale";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck::new("ready", "recommendation engine runtime initialized"),
        database,
        scoring,
        scheduler,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck::new("ready", "database probe succeeded"),
        Err(probe_error) => {
            HealthCheck::new("degraded", format!("database probe failed: {probe_error}"))
        }
    }
}

fn scoring_check(config: &ScoringServiceConfig) -> HealthCheck {
    let base_url = config.base_url.trim();
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        HealthCheck::new(
            "ready",
            format!(
                "scoring service configured at {base_url} with {}s timeout",
                config.timeout_secs
            ),
        )
    } else {
        HealthCheck::new("degraded", format!("scoring.base_url `{base_url}` is not an http(s) URL"))
    }
}

fn scheduler_check(status: &SchedulerStatus, interval_secs: u64) -> HealthCheck {
    let Some(run) = status.last_run() else {
        return HealthCheck::new("pending", "no batch run completed yet");
    };

    let age_secs = Utc::now().signed_duration_since(run.completed_at).num_seconds();
    let stale_after_secs = interval_secs.saturating_mul(2) as i64;
    if age_secs > stale_after_secs {
        HealthCheck::new(
            "stale",
            format!(
                "last batch run completed {age_secs}s ago, beyond twice the {interval_secs}s interval"
            ),
        )
    } else {
        HealthCheck::new(
            "ready",
            format!(
                "last batch run processed {} users ({} failed)",
                run.summary.users, run.summary.failed
            ),
        )
    }
}
