//! Per-mode rating stats and the tactics / lessons / puzzle-rush sub-stats.

use crate::chess::models::{ModeStats, RushScore, SpreadStats, StatsResponse, mode_key_parts};
use crate::data::epoch_now;
use crate::error::{IngestError, Result};
use sqlx::PgPool;

/// Upsert every per-mode stats row plus the sub-stat singletons for a
/// player. Mode keys not prefixed with `chess` (fide, puzzle trackers) are
/// ignored.
pub async fn upsert_player_stats(
    pool: &PgPool,
    player_id: i64,
    stats: &StatsResponse,
) -> Result<()> {
    let now = epoch_now();

    for (key, payload) in &stats.modes {
        if !key.starts_with("chess") {
            continue;
        }
        let mode: ModeStats = serde_json::from_value(payload.clone())
            .map_err(|e| IngestError::Decode(format!("stats key {key}: {e}")))?;
        let (rules, time_class) = mode_key_parts(key);

        let last = mode.last.unwrap_or_default();
        let best = mode.best.unwrap_or_default();
        let record = mode.record.unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO player_stats (
                player_id, rules, time_class,
                last_rating, last_rating_date, last_rd,
                best_rating, best_date, best_game_url,
                record_win, record_loss, record_draw,
                time_per_move, timeout_percent, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            ON CONFLICT (player_id, rules, time_class) DO UPDATE SET
                last_rating = EXCLUDED.last_rating,
                last_rating_date = EXCLUDED.last_rating_date,
                last_rd = EXCLUDED.last_rd,
                best_rating = EXCLUDED.best_rating,
                best_date = EXCLUDED.best_date,
                best_game_url = EXCLUDED.best_game_url,
                record_win = EXCLUDED.record_win,
                record_loss = EXCLUDED.record_loss,
                record_draw = EXCLUDED.record_draw,
                time_per_move = EXCLUDED.time_per_move,
                timeout_percent = EXCLUDED.timeout_percent,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(player_id)
        .bind(rules)
        .bind(time_class)
        .bind(last.rating)
        .bind(last.date)
        .bind(last.rd)
        .bind(best.rating)
        .bind(best.date)
        .bind(&best.game)
        .bind(record.win)
        .bind(record.loss)
        .bind(record.draw)
        .bind(mode.time_per_move)
        .bind(mode.timeout_percent)
        .bind(now)
        .execute(pool)
        .await?;
    }

    if let Some(tactics) = &stats.tactics {
        upsert_spread_stats(pool, "player_tactics_stats", player_id, tactics, now).await?;
    }
    if let Some(lessons) = &stats.lessons {
        upsert_spread_stats(pool, "player_lessons_stats", player_id, lessons, now).await?;
    }

    if let Some(puzzle_rush) = &stats.puzzle_rush {
        let best = puzzle_rush.best.clone().unwrap_or_default();
        let daily = puzzle_rush.daily.clone().unwrap_or_default();
        upsert_rush_score(pool, "player_puzzle_rush_best", player_id, &best, now).await?;
        upsert_rush_score(pool, "player_puzzle_rush_daily", player_id, &daily, now).await?;
    }

    Ok(())
}

async fn upsert_spread_stats(
    pool: &PgPool,
    table: &str,
    player_id: i64,
    spread: &SpreadStats,
    now: i64,
) -> Result<()> {
    let highest = spread.highest.clone().unwrap_or_default();
    let lowest = spread.lowest.clone().unwrap_or_default();

    // `table` is always a string literal from this module
    let sql = format!(
        r#"
        INSERT INTO {table} (
            player_id, highest_rating, highest_date, lowest_rating, lowest_date, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (player_id) DO UPDATE SET
            highest_rating = EXCLUDED.highest_rating,
            highest_date = EXCLUDED.highest_date,
            lowest_rating = EXCLUDED.lowest_rating,
            lowest_date = EXCLUDED.lowest_date,
            updated_at = EXCLUDED.updated_at
        "#
    );

    sqlx::query(&sql)
        .bind(player_id)
        .bind(highest.rating)
        .bind(highest.date)
        .bind(lowest.rating)
        .bind(lowest.date)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(())
}

async fn upsert_rush_score(
    pool: &PgPool,
    table: &str,
    player_id: i64,
    score: &RushScore,
    now: i64,
) -> Result<()> {
    let sql = format!(
        r#"
        INSERT INTO {table} (player_id, total_attempts, score, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (player_id) DO UPDATE SET
            total_attempts = EXCLUDED.total_attempts,
            score = EXCLUDED.score,
            updated_at = EXCLUDED.updated_at
        "#
    );

    sqlx::query(&sql)
        .bind(player_id)
        .bind(score.total_attempts)
        .bind(score.score)
        .bind(now)
        .execute(pool)
        .await?;

    Ok(())
}
