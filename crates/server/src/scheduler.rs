//! Periodic batch regeneration across all known users.
//!
//! A single background task fires on a fixed interval. Within one firing,
//! users are processed strictly sequentially with an inter-user pause to
//! bound load on the shared catalog and order stores. One user's failure is
//! logged and skipped; the run continues. Each completed run is snapshotted
//! into [`SchedulerStatus`] for the health endpoint.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use mandi_core::config::RecsConfig;
use mandi_db::repositories::{EventRepository, SqlEventRepository, SqlUserRepository, UserRepository};
use mandi_db::DbPool;

use crate::generator::RecommendationGenerator;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchRunSummary {
    pub users: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub events_purged: u64,
}

#[derive(Clone, Debug)]
pub struct BatchRunRecord {
    pub completed_at: DateTime<Utc>,
    pub summary: BatchRunSummary,
}

/// Shared snapshot of the most recent completed batch run. The scheduler
/// writes it at the end of every pass; `/health` reads it to judge liveness.
#[derive(Clone, Default)]
pub struct SchedulerStatus {
    last_run: Arc<RwLock<Option<BatchRunRecord>>>,
}

impl SchedulerStatus {
    pub fn record(&self, summary: BatchRunSummary) {
        self.record_at(summary, Utc::now());
    }

    pub(crate) fn record_at(&self, summary: BatchRunSummary, completed_at: DateTime<Utc>) {
        if let Ok(mut guard) = self.last_run.write() {
            *guard = Some(BatchRunRecord { completed_at, summary });
        }
    }

    pub fn last_run(&self) -> Option<BatchRunRecord> {
        self.last_run.read().ok().and_then(|guard| guard.clone())
    }
}

pub struct BatchScheduler {
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventRepository>,
    generator: Arc<RecommendationGenerator>,
    status: SchedulerStatus,
    interval: Duration,
    user_delay: Duration,
    retention_days: i64,
}

impl BatchScheduler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        events: Arc<dyn EventRepository>,
        generator: Arc<RecommendationGenerator>,
        config: &RecsConfig,
        status: SchedulerStatus,
    ) -> Self {
        Self {
            users,
            events,
            generator,
            status,
            interval: Duration::from_secs(config.batch_interval_secs),
            user_delay: Duration::from_millis(config.batch_user_delay_ms),
            retention_days: config.event_retention_days,
        }
    }

    pub fn from_pool(
        pool: DbPool,
        generator: Arc<RecommendationGenerator>,
        config: &RecsConfig,
        status: SchedulerStatus,
    ) -> Self {
        Self::new(
            Arc::new(SqlUserRepository::new(pool.clone())),
            Arc::new(SqlEventRepository::new(pool)),
            generator,
            config,
            status,
        )
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }

    /// One full batch pass. Never returns an error: every failure mode is
    /// absorbed at the granularity it occurs at.
    pub async fn run_once(&self) -> BatchRunSummary {
        let mut summary = BatchRunSummary::default();

        match self.events.purge_expired(self.retention_days).await {
            Ok(purged) => {
                summary.events_purged = purged;
                if purged > 0 {
                    info!(
                        event_name = "recs.batch.events_purged",
                        purged,
                        retention_days = self.retention_days,
                        "expired behavioral events removed"
                    );
                }
            }
            Err(retention_error) => {
                warn!(
                    event_name = "recs.batch.purge_failed",
                    error = %retention_error,
                    "event retention purge failed, continuing with batch run"
                );
            }
        }

        let users = match self.users.all_ids().await {
            Ok(users) => users,
            Err(enumeration_error) => {
                error!(
                    event_name = "recs.batch.enumeration_failed",
                    error = %enumeration_error,
                    "could not enumerate users, skipping batch run"
                );
                self.status.record(summary);
                return summary;
            }
        };
        summary.users = users.len();

        for (index, user) in users.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.user_delay).await;
            }

            match self.generator.generate_for_user(user).await {
                Ok(_) => summary.succeeded += 1,
                Err(generation_error) => {
                    summary.failed += 1;
                    warn!(
                        event_name = "recs.batch.user_failed",
                        user_id = %user,
                        error = %generation_error,
                        "generation failed for user, continuing with remaining users"
                    );
                }
            }
        }

        self.status.record(summary);
        info!(
            event_name = "recs.batch.completed",
            users = summary.users,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch recommendation run completed"
        );
        summary
    }
}
