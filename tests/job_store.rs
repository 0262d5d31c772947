#[allow(dead_code)]
mod helpers;

use chessfeed::data::jobs::{self, DEFAULT_MAX_ATTEMPTS};
use chessfeed::data::models::{JobKind, JobStatus};
use chessfeed::data::epoch_now;
use serde_json::json;
use sqlx::PgPool;

// ── seed fan-out ────────────────────────────────────────────────────

#[sqlx::test]
async fn seed_produces_three_staggered_jobs(pool: PgPool) {
    let before = epoch_now();
    jobs::enqueue_seed_jobs(&pool, "Alice").await.unwrap();

    let rows: Vec<(JobKind, i32, i64, serde_json::Value)> = sqlx::query_as(
        "SELECT job_type, priority, available_at, scope FROM ingestion_jobs ORDER BY priority",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 3);
    let kinds: Vec<JobKind> = rows.iter().map(|r| r.0).collect();
    assert_eq!(kinds, vec![JobKind::Profile, JobKind::Stats, JobKind::Archives]);
    let priorities: Vec<i32> = rows.iter().map(|r| r.1).collect();
    assert_eq!(priorities, vec![1, 2, 3]);

    for (row, offset) in rows.iter().zip([0i64, 15, 30]) {
        let expected = before + offset;
        assert!(
            (row.2 - expected).abs() <= 2,
            "available_at {} should be ~{expected}",
            row.2
        );
        assert_eq!(row.3, json!({"username": "alice"}), "scope is lowercased");
    }
}

#[sqlx::test]
async fn seed_twice_is_idempotent(pool: PgPool) {
    jobs::enqueue_seed_jobs(&pool, "alice").await.unwrap();
    jobs::enqueue_seed_jobs(&pool, "alice").await.unwrap();

    assert_eq!(helpers::count_jobs(&pool).await, 3);

    let priorities: Vec<i32> =
        sqlx::query_scalar("SELECT priority FROM ingestion_jobs ORDER BY priority")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(priorities, vec![1, 2, 3]);
}

// ── enqueue merge rules ─────────────────────────────────────────────

#[sqlx::test]
async fn duplicate_enqueue_takes_tighter_priority_and_looser_cap(pool: PgPool) {
    let scope = json!({"username": "alice"});
    let id = jobs::enqueue(&pool, JobKind::Stats, None, scope.clone(), 5, 60, 3)
        .await
        .unwrap();
    let merged = jobs::enqueue(&pool, JobKind::Stats, None, scope, 2, 0, 8)
        .await
        .unwrap();
    assert_eq!(id, merged);

    let (status, _, priority, available_at, _) = helpers::job_row(&pool, id).await;
    let (max_attempts,): (i32,) =
        sqlx::query_as("SELECT max_attempts FROM ingestion_jobs WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();

    assert_eq!(status, JobStatus::Queued);
    assert_eq!(priority, 2, "min priority wins");
    assert!(available_at <= epoch_now() + 2, "min available_at wins");
    assert_eq!(max_attempts, 8, "max attempt cap wins");
}

#[sqlx::test]
async fn terminal_jobs_are_never_revived(pool: PgPool) {
    let scope = json!({"username": "alice"});
    let id = jobs::enqueue(&pool, JobKind::Profile, None, scope.clone(), 1, 0, 5)
        .await
        .unwrap();
    jobs::claim_one(&pool).await.unwrap().unwrap();
    jobs::mark_success(&pool, id).await.unwrap();

    let again = jobs::enqueue(&pool, JobKind::Profile, None, scope, 1, 0, 5)
        .await
        .unwrap();
    assert_eq!(id, again, "dedup key collapses onto the same row");

    let (status, ..) = helpers::job_row(&pool, id).await;
    assert_eq!(status, JobStatus::Succeeded);
    assert_eq!(helpers::count_jobs(&pool).await, 1);
}

// ── claim semantics ─────────────────────────────────────────────────

#[sqlx::test]
async fn claim_on_empty_queue_returns_none(pool: PgPool) {
    assert!(jobs::claim_one(&pool).await.unwrap().is_none());
}

#[sqlx::test]
async fn claim_locks_and_counts_the_attempt(pool: PgPool) {
    let id = jobs::enqueue(&pool, JobKind::Stats, None, json!({"username": "a"}), 2, 0, 5)
        .await
        .unwrap();

    let job = jobs::claim_one(&pool).await.unwrap().expect("one job queued");
    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Locked);
    assert_eq!(job.attempts, 1);
    assert!(job.locked_at.is_some());

    // the locked job is no longer claimable
    assert!(jobs::claim_one(&pool).await.unwrap().is_none());
}

#[sqlx::test]
async fn claim_orders_by_priority_then_id(pool: PgPool) {
    let low = jobs::enqueue(&pool, JobKind::Games, None, json!({"n": 1}), 5, 0, 5)
        .await
        .unwrap();
    let urgent_first = jobs::enqueue(&pool, JobKind::Profile, None, json!({"n": 2}), 1, 0, 5)
        .await
        .unwrap();
    let urgent_second = jobs::enqueue(&pool, JobKind::Profile, None, json!({"n": 3}), 1, 0, 5)
        .await
        .unwrap();

    let first = jobs::claim_one(&pool).await.unwrap().unwrap();
    let second = jobs::claim_one(&pool).await.unwrap().unwrap();
    let third = jobs::claim_one(&pool).await.unwrap().unwrap();

    assert_eq!(first.id, urgent_first, "lowest priority number first");
    assert_eq!(second.id, urgent_second, "FIFO within a priority");
    assert_eq!(third.id, low);
}

#[sqlx::test]
async fn claim_skips_jobs_not_yet_available(pool: PgPool) {
    jobs::enqueue(&pool, JobKind::Stats, None, json!({"username": "a"}), 2, 3600, 5)
        .await
        .unwrap();
    assert!(jobs::claim_one(&pool).await.unwrap().is_none());
}

#[sqlx::test]
async fn concurrent_claims_never_hand_out_the_same_job(pool: PgPool) {
    for n in 0..8 {
        jobs::enqueue(&pool, JobKind::Games, None, json!({"n": n}), 5, 0, 5)
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = jobs::claim_one(&pool).await.unwrap() {
                claimed.push(job.id);
            }
            claimed
        }));
    }

    let mut all: Vec<i64> = Vec::new();
    for task in tasks {
        all.extend(task.await.unwrap());
    }

    all.sort_unstable();
    let before_dedup = all.len();
    all.dedup();
    assert_eq!(before_dedup, all.len(), "no job claimed twice");
    assert_eq!(all.len(), 8, "every job claimed exactly once");
}

// ── failure and retry ───────────────────────────────────────────────

#[sqlx::test]
async fn failed_job_requeues_with_backoff_then_freezes(pool: PgPool) {
    let id = jobs::enqueue(&pool, JobKind::Stats, None, json!({"username": "a"}), 2, 0, 2)
        .await
        .unwrap();

    // first failure: back to queued, available ~300s out
    jobs::claim_one(&pool).await.unwrap().unwrap();
    jobs::mark_failure(&pool, id, "HTTP 500", 300).await.unwrap();
    let (status, attempts, _, available_at, error) = helpers::job_row(&pool, id).await;
    assert_eq!(status, JobStatus::Queued);
    assert_eq!(attempts, 1);
    let expected = epoch_now() + 300;
    assert!((available_at - expected).abs() <= 2);
    assert_eq!(error.as_deref(), Some("HTTP 500"));

    // make it claimable again without waiting out the backoff
    sqlx::query("UPDATE ingestion_jobs SET available_at = $1 WHERE id = $2")
        .bind(epoch_now())
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    // second failure exhausts the cap
    jobs::claim_one(&pool).await.unwrap().unwrap();
    let frozen_at = helpers::job_row(&pool, id).await.3;
    jobs::mark_failure(&pool, id, "HTTP 500", 300).await.unwrap();
    let (status, attempts, _, available_at, _) = helpers::job_row(&pool, id).await;
    assert_eq!(status, JobStatus::Failed);
    assert_eq!(attempts, 2);
    assert_eq!(available_at, frozen_at, "available_at frozen on terminal failure");

    // a frozen job is not claimable
    assert!(jobs::claim_one(&pool).await.unwrap().is_none());
}

#[sqlx::test]
async fn permanent_failure_ignores_remaining_attempts(pool: PgPool) {
    let id = jobs::enqueue(&pool, JobKind::Games, None, json!({"username": "a"}), 5, 0, 5)
        .await
        .unwrap();
    jobs::claim_one(&pool).await.unwrap().unwrap();
    jobs::mark_permanent_failure(&pool, id, "invalid job scope: missing archive_url")
        .await
        .unwrap();

    let (status, attempts, _, _, error) = helpers::job_row(&pool, id).await;
    assert_eq!(status, JobStatus::Failed);
    assert_eq!(attempts, 1);
    assert!(error.unwrap().contains("archive_url"));
}

#[sqlx::test]
async fn persisted_error_is_truncated(pool: PgPool) {
    let id = jobs::enqueue(&pool, JobKind::Stats, None, json!({"username": "a"}), 2, 0, 5)
        .await
        .unwrap();
    jobs::claim_one(&pool).await.unwrap().unwrap();
    jobs::mark_failure(&pool, id, &"x".repeat(2000), 300).await.unwrap();

    let (_, _, _, _, error) = helpers::job_row(&pool, id).await;
    assert_eq!(error.unwrap().len(), 500);
}

// ── stale-lock recovery ─────────────────────────────────────────────

#[sqlx::test]
async fn stale_locks_are_released(pool: PgPool) {
    let stale = jobs::enqueue(&pool, JobKind::Stats, None, json!({"n": 1}), 2, 0, 5)
        .await
        .unwrap();
    let fresh = jobs::enqueue(&pool, JobKind::Stats, None, json!({"n": 2}), 2, 0, 5)
        .await
        .unwrap();
    jobs::claim_one(&pool).await.unwrap().unwrap();
    jobs::claim_one(&pool).await.unwrap().unwrap();

    // age one lock past the threshold
    sqlx::query("UPDATE ingestion_jobs SET locked_at = $1 WHERE id = $2")
        .bind(epoch_now() - 7200)
        .bind(stale)
        .execute(&pool)
        .await
        .unwrap();

    let released = jobs::release_stale_locks(&pool, 1800).await.unwrap();
    assert_eq!(released, 1);

    let (status, ..) = helpers::job_row(&pool, stale).await;
    assert_eq!(status, JobStatus::Queued);
    let (status, ..) = helpers::job_row(&pool, fresh).await;
    assert_eq!(status, JobStatus::Locked, "recent locks are left alone");

    // the released job can be claimed again
    let reclaimed = jobs::claim_one(&pool).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, stale);
    assert_eq!(reclaimed.attempts, 2);
}

#[sqlx::test]
async fn default_max_attempts_is_applied(pool: PgPool) {
    let id = jobs::enqueue(
        &pool,
        JobKind::Profile,
        None,
        json!({"username": "a"}),
        1,
        0,
        DEFAULT_MAX_ATTEMPTS,
    )
    .await
    .unwrap();
    let (max_attempts,): (i32,) =
        sqlx::query_as("SELECT max_attempts FROM ingestion_jobs WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(max_attempts, 5);
}
