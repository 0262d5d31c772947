//! Retry backoff policy and the periodic maintenance scan.
//!
//! The scan runs only in loop mode: it requeues jobs whose locks went stale
//! and enqueues refresh jobs for players whose cadence timestamps have come
//! due.

use crate::config::Config;
use crate::data::models::JobKind;
use crate::data::{epoch_now, jobs};
use crate::error::Result;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Delay before the first retry of a failed job.
pub const BASE_RETRY_DELAY_SECS: i64 = 300;

/// Ceiling for the exponential retry schedule.
pub const MAX_RETRY_DELAY_SECS: i64 = 3600;

/// How often the maintenance scan runs.
const SCAN_INTERVAL: Duration = Duration::from_secs(60);

/// Exponential backoff: 300 s after the first attempt, doubling per attempt,
/// capped at an hour.
pub fn retry_backoff(attempts: i32) -> i64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    BASE_RETRY_DELAY_SECS
        .saturating_mul(1_i64 << exponent)
        .min(MAX_RETRY_DELAY_SECS)
}

/// Periodic maintenance task for loop mode.
pub struct Scheduler {
    pool: PgPool,
    config: Arc<Config>,
}

impl Scheduler {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self { pool, config }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Scheduler started");
        let mut next_run = time::Instant::now();
        loop {
            tokio::select! {
                _ = time::sleep_until(next_run) => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "Maintenance scan failed");
                    }
                    next_run = time::Instant::now() + SCAN_INTERVAL;
                }
                _ = shutdown.cancelled() => {
                    info!("Scheduler stopped");
                    break;
                }
            }
        }
    }

    pub async fn tick(&self) -> Result<()> {
        let released =
            jobs::release_stale_locks(&self.pool, self.config.ingestion_lock_expiry_seconds)
                .await?;
        if released > 0 {
            warn!(released, "Released stale job locks");
        }

        let enqueued = enqueue_due_refreshes(&self.pool).await?;
        if enqueued > 0 {
            info!(enqueued, "Enqueued due refresh jobs");
        }
        Ok(())
    }
}

/// Enqueue a refresh job for every player whose next-due timestamp has
/// passed. Dedup in the job store makes repeat scans idempotent while a
/// refresh is still pending.
pub async fn enqueue_due_refreshes(pool: &PgPool) -> Result<u64> {
    let now = epoch_now();
    let due: Vec<(i64, String, bool, bool, bool)> = sqlx::query_as(
        "SELECT s.player_id, p.username,
                (s.next_profile_fetch IS NOT NULL AND s.next_profile_fetch <= $1) AS profile_due,
                (s.next_stats_fetch IS NOT NULL AND s.next_stats_fetch <= $1) AS stats_due,
                (s.next_archives_scan IS NOT NULL AND s.next_archives_scan <= $1) AS archives_due
         FROM player_ingestion_state s
         JOIN players p ON p.id = s.player_id
         WHERE s.next_profile_fetch <= $1
            OR s.next_stats_fetch <= $1
            OR s.next_archives_scan <= $1",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    let mut enqueued = 0;
    for (player_id, username, profile_due, stats_due, archives_due) in due {
        let scope = json!({ "username": username });
        if profile_due {
            jobs::enqueue(
                pool,
                JobKind::Profile,
                Some(player_id),
                scope.clone(),
                1,
                0,
                jobs::DEFAULT_MAX_ATTEMPTS,
            )
            .await?;
            enqueued += 1;
        }
        if stats_due {
            jobs::enqueue(
                pool,
                JobKind::Stats,
                Some(player_id),
                scope.clone(),
                2,
                0,
                jobs::DEFAULT_MAX_ATTEMPTS,
            )
            .await?;
            enqueued += 1;
        }
        if archives_due {
            jobs::enqueue(
                pool,
                JobKind::Archives,
                Some(player_id),
                scope.clone(),
                3,
                0,
                jobs::DEFAULT_MAX_ATTEMPTS,
            )
            .await?;
            enqueued += 1;
        }
    }
    Ok(enqueued)
}
