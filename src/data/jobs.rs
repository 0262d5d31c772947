//! The persistent job store backing the ingestion queue.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so any number of workers can poll
//! concurrently without handing the same job out twice; duplicate enqueues
//! collapse onto a deterministic dedup key.

use crate::data::epoch_now;
use crate::data::models::{IngestionJob, JobKind};
use crate::error::Result;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Error strings persisted on a job are capped at this length.
const MAX_ERROR_LEN: usize = 500;

/// Deterministic fingerprint collapsing duplicate enqueues of the same work.
///
/// serde_json maps serialize with sorted keys, so the serialization of
/// `{player_id, scope}` is canonical for a given input.
pub fn dedupe_key(kind: JobKind, player_id: Option<i64>, scope: &Value) -> String {
    let payload = json!({ "player_id": player_id, "scope": scope });
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    format!("{}:{:x}", kind.as_str(), hasher.finalize())
}

/// Insert a job, or merge into the existing row with the same dedup key.
///
/// Merge rules: a terminal job (`succeeded`/`cancelled`) is never revived;
/// otherwise the row goes back to `queued` and takes the tighter of the
/// existing and incoming priority and `available_at`, and the looser
/// attempt cap.
pub async fn enqueue(
    pool: &PgPool,
    kind: JobKind,
    player_id: Option<i64>,
    scope: Value,
    priority: i32,
    delay_seconds: i64,
    max_attempts: i32,
) -> Result<i64> {
    let key = dedupe_key(kind, player_id, &scope);
    let available_at = epoch_now() + delay_seconds.max(0);

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO ingestion_jobs (
            player_id, job_type, scope, dedupe_key, status,
            priority, attempts, max_attempts, available_at
        )
        VALUES ($1, $2, $3, $4, 'queued', $5, 0, $6, $7)
        ON CONFLICT (dedupe_key) DO UPDATE SET
            status = CASE
                WHEN ingestion_jobs.status IN ('succeeded', 'cancelled') THEN ingestion_jobs.status
                ELSE 'queued'::job_status END,
            priority = LEAST(ingestion_jobs.priority, EXCLUDED.priority),
            available_at = LEAST(ingestion_jobs.available_at, EXCLUDED.available_at),
            max_attempts = GREATEST(ingestion_jobs.max_attempts, EXCLUDED.max_attempts)
        RETURNING id
        "#,
    )
    .bind(player_id)
    .bind(kind)
    .bind(&scope)
    .bind(&key)
    .bind(priority)
    .bind(max_attempts)
    .bind(available_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Seed the discovery cascade for a username: profile now, stats and
/// archives staggered a little behind so the first burst spreads out.
pub async fn enqueue_seed_jobs(pool: &PgPool, username: &str) -> Result<()> {
    let username = username.to_lowercase();
    info!(username = %username, "Enqueuing seed jobs");
    let scope = json!({ "username": username });
    enqueue(
        pool,
        JobKind::Profile,
        None,
        scope.clone(),
        1,
        0,
        DEFAULT_MAX_ATTEMPTS,
    )
    .await?;
    enqueue(
        pool,
        JobKind::Stats,
        None,
        scope.clone(),
        2,
        15,
        DEFAULT_MAX_ATTEMPTS,
    )
    .await?;
    enqueue(pool, JobKind::Archives, None, scope, 3, 30, DEFAULT_MAX_ATTEMPTS).await?;
    Ok(())
}

/// Atomically claim the next eligible job, transitioning it to `locked` and
/// counting the attempt.
///
/// Eligible means `queued` with `available_at` in the past; ties break by
/// ascending priority then ascending id (FIFO within a priority). The
/// select and the transition share one transaction, and `SKIP LOCKED`
/// keeps concurrent claimers off the same row.
pub async fn claim_one(pool: &PgPool) -> Result<Option<IngestionJob>> {
    let mut tx = pool.begin().await?;

    let job = sqlx::query_as::<_, IngestionJob>(
        "SELECT * FROM ingestion_jobs
         WHERE status = 'queued' AND available_at <= $1
         ORDER BY priority ASC, id ASC
         LIMIT 1
         FOR UPDATE SKIP LOCKED",
    )
    .bind(epoch_now())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(job) = job else {
        tx.commit().await?;
        return Ok(None);
    };

    let claimed = sqlx::query_as::<_, IngestionJob>(
        "UPDATE ingestion_jobs
         SET status = 'locked', locked_at = $1, attempts = attempts + 1
         WHERE id = $2
         RETURNING *",
    )
    .bind(epoch_now())
    .bind(job.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(claimed))
}

pub async fn mark_success(pool: &PgPool, job_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE ingestion_jobs
         SET status = 'succeeded', completed_at = $1
         WHERE id = $2",
    )
    .bind(epoch_now())
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Requeue a failed job with a delay, or freeze it as `failed` once the
/// attempt cap is spent. The cap check runs in SQL so concurrent markers
/// agree on the outcome.
pub async fn mark_failure(pool: &PgPool, job_id: i64, error: &str, retry_delay: i64) -> Result<()> {
    sqlx::query(
        "UPDATE ingestion_jobs
         SET status = CASE
                 WHEN attempts >= max_attempts THEN 'failed'::job_status
                 ELSE 'queued'::job_status END,
             available_at = CASE
                 WHEN attempts >= max_attempts THEN available_at
                 ELSE $1 + $2 END,
             error = $3
         WHERE id = $4",
    )
    .bind(epoch_now())
    .bind(retry_delay)
    .bind(truncate_error(error))
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fail a job outright, ignoring remaining attempts. Used for errors no
/// retry can fix (bad scope).
pub async fn mark_permanent_failure(pool: &PgPool, job_id: i64, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE ingestion_jobs
         SET status = 'failed', error = $1
         WHERE id = $2",
    )
    .bind(truncate_error(error))
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Requeue `locked` jobs whose lock is older than the threshold.
///
/// A worker that dies mid-job leaves its row locked forever; this sweep is
/// the recovery path. The threshold must exceed the slowest expected
/// handler by a wide margin.
///
/// Returns the number of jobs released.
pub async fn release_stale_locks(pool: &PgPool, older_than_seconds: i64) -> Result<u64> {
    let cutoff = epoch_now() - older_than_seconds;
    let result = sqlx::query(
        "UPDATE ingestion_jobs
         SET status = 'queued', locked_at = NULL
         WHERE status = 'locked' AND locked_at IS NOT NULL AND locked_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

fn truncate_error(error: &str) -> String {
    error.chars().take(MAX_ERROR_LEN).collect()
}
