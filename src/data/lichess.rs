//! Upserts for the lichess mirror tables. These use millisecond epochs,
//! matching the upstream payload's timestamps.

use crate::data::epoch_now_ms;
use crate::error::{IngestError, Result};
use crate::lichess::models::{LichessPerf, LichessUser};
use sqlx::PgPool;
use std::collections::BTreeMap;

/// Insert or update a lichess player, returning the internal id. Keyed on
/// the lowercase account id.
pub async fn upsert_lichess_player(pool: &PgPool, user: &LichessUser) -> Result<i64> {
    let username = user.id.to_lowercase();
    if username.is_empty() {
        return Err(IngestError::Decode(
            "lichess profile missing 'id' field".to_string(),
        ));
    }

    let play_time_total = user.play_time.as_ref().and_then(|p| p.total);
    let (bio, country) = match &user.profile {
        Some(profile) => (profile.bio.clone(), profile.country.clone()),
        None => (None, None),
    };

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO lichess_players (
            username, display_username, title, patron,
            tos_violation, disabled, verified,
            created_at, seen_at, play_time_total,
            url, bio, country, flair, ingested_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (username) DO UPDATE SET
            display_username = EXCLUDED.display_username,
            title = EXCLUDED.title,
            patron = EXCLUDED.patron,
            tos_violation = EXCLUDED.tos_violation,
            disabled = EXCLUDED.disabled,
            verified = EXCLUDED.verified,
            seen_at = EXCLUDED.seen_at,
            play_time_total = EXCLUDED.play_time_total,
            url = EXCLUDED.url,
            bio = EXCLUDED.bio,
            country = EXCLUDED.country,
            flair = EXCLUDED.flair,
            ingested_at = EXCLUDED.ingested_at
        RETURNING id
        "#,
    )
    .bind(&username)
    .bind(&user.username)
    .bind(&user.title)
    .bind(user.patron)
    .bind(user.tos_violation)
    .bind(user.disabled)
    .bind(user.verified)
    .bind(user.created_at)
    .bind(user.seen_at)
    .bind(play_time_total)
    .bind(&user.url)
    .bind(bio)
    .bind(country)
    .bind(&user.flair)
    .bind(epoch_now_ms())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Upsert one row per perf that carries a rating; storm/streak style
/// trackers without one are skipped.
pub async fn upsert_lichess_player_stats(
    pool: &PgPool,
    player_id: i64,
    perfs: &BTreeMap<String, LichessPerf>,
) -> Result<()> {
    let now_ms = epoch_now_ms();
    for (perf, data) in perfs {
        let Some(rating) = data.rating else {
            continue;
        };
        sqlx::query(
            r#"
            INSERT INTO lichess_player_stats (
                player_id, perf, rating, rd, prog, games, prov, fetched_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (player_id, perf) DO UPDATE SET
                rating = EXCLUDED.rating,
                rd = EXCLUDED.rd,
                prog = EXCLUDED.prog,
                games = EXCLUDED.games,
                prov = EXCLUDED.prov,
                fetched_at = EXCLUDED.fetched_at
            "#,
        )
        .bind(player_id)
        .bind(perf)
        .bind(rating)
        .bind(data.rd)
        .bind(data.prog)
        .bind(data.games)
        .bind(data.prov)
        .bind(now_ms)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Update the lichess ingestion-state row; the last-fetch timestamp is only
/// written when `profile_touch` is set, status and error always are.
pub async fn touch_lichess_ingestion_state(
    pool: &PgPool,
    player_id: i64,
    profile_touch: bool,
    status: &str,
    error: Option<&str>,
) -> Result<()> {
    let now_ms = epoch_now_ms();
    let last_profile_fetch = profile_touch.then_some(now_ms);

    sqlx::query(
        r#"
        INSERT INTO lichess_player_ingestion_state (
            player_id, last_profile_fetch, status, error, updated_at
        )
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (player_id) DO UPDATE SET
            last_profile_fetch = COALESCE(EXCLUDED.last_profile_fetch, lichess_player_ingestion_state.last_profile_fetch),
            status = EXCLUDED.status,
            error = EXCLUDED.error,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(player_id)
    .bind(last_profile_fetch)
    .bind(status)
    .bind(error)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(())
}
