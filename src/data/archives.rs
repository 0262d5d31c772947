//! Monthly archive rows: discovery upsert and fetch-state transitions.

use crate::data::epoch_now;
use crate::error::Result;
use sqlx::PgPool;

/// Insert or refresh a monthly archive row, returning `(id, inserted)`.
///
/// `inserted` tells the archive enumerator whether a games job needs to be
/// enqueued for this month. A `succeeded` status is sticky: rediscovery
/// keeps it and its retry count; any other status resets to `pending`.
pub async fn upsert_monthly_archive(
    pool: &PgPool,
    player_id: i64,
    year: i32,
    month: i32,
    url: &str,
    priority: i32,
) -> Result<(i64, bool)> {
    let now = epoch_now();
    let row = sqlx::query_as::<_, (i64, bool)>(
        r#"
        INSERT INTO monthly_archives (
            player_id, year, month, url, created_at, updated_at, fetch_status, retry_count, priority
        )
        VALUES ($1, $2, $3, $4, $5, $5, 'pending', 0, $6)
        ON CONFLICT (player_id, year, month) DO UPDATE SET
            url = EXCLUDED.url,
            updated_at = EXCLUDED.updated_at,
            fetch_status = CASE
                WHEN monthly_archives.fetch_status = 'succeeded' THEN monthly_archives.fetch_status
                ELSE 'pending'::archive_fetch_status END,
            retry_count = CASE
                WHEN monthly_archives.fetch_status = 'succeeded' THEN monthly_archives.retry_count
                ELSE 0 END,
            priority = LEAST(monthly_archives.priority, EXCLUDED.priority)
        RETURNING id, (xmax = 0) AS inserted
        "#,
    )
    .bind(player_id)
    .bind(year)
    .bind(month)
    .bind(url)
    .bind(now)
    .bind(priority)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn find_archive_id(
    pool: &PgPool,
    player_id: i64,
    year: i32,
    month: i32,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM monthly_archives WHERE player_id = $1 AND year = $2 AND month = $3",
    )
    .bind(player_id)
    .bind(year)
    .bind(month)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Record that a games job has started working this archive.
pub async fn mark_archive_in_flight(pool: &PgPool, archive_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE monthly_archives
         SET fetch_status = 'in_flight', last_fetch_attempt = $1, updated_at = $1
         WHERE id = $2",
    )
    .bind(epoch_now())
    .bind(archive_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Flip an archive to `succeeded` after the whole game batch landed,
/// clearing the retry bookkeeping.
pub async fn mark_archive_succeeded(
    pool: &PgPool,
    player_id: i64,
    year: i32,
    month: i32,
) -> Result<()> {
    sqlx::query(
        "UPDATE monthly_archives
         SET fetch_status = 'succeeded',
             last_fetch_attempt = $1,
             last_success_at = $1,
             retry_count = 0,
             next_retry_at = NULL,
             updated_at = $1
         WHERE player_id = $2 AND year = $3 AND month = $4",
    )
    .bind(epoch_now())
    .bind(player_id)
    .bind(year)
    .bind(month)
    .execute(pool)
    .await?;
    Ok(())
}
