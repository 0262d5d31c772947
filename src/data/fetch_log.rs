//! Append-only journal of outbound HTTP calls. No read path; forensic
//! storage for debugging and throttling analysis.

use crate::data::epoch_now;
use crate::error::Result;
use sqlx::PgPool;

/// Record one outbound call. `status_code` is None for transport-level
/// failures that never produced a response.
pub async fn log_fetch(
    pool: &PgPool,
    url: &str,
    status_code: Option<i32>,
    etag: Option<&str>,
    last_modified: Option<&str>,
    error: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO fetch_log (url, etag, last_modified, status_code, fetched_at, error)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(url)
    .bind(etag)
    .bind(last_modified)
    .bind(status_code)
    .bind(epoch_now())
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}
