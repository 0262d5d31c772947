//! Game rows, keyed on the platform game URL.

use crate::chess::models::ArchiveGame;
use crate::data::epoch_now;
use crate::error::Result;
use sqlx::PgPool;

/// Insert or update a game. Games without a URL are skipped (the URL is the
/// natural key).
///
/// Side player references are nullable and only ever improve: a re-ingestion
/// carrying NULL for a side preserves the previously-resolved reference.
pub async fn upsert_game(
    pool: &PgPool,
    game: &ArchiveGame,
    archive_id: i64,
    white_player_id: Option<i64>,
    black_player_id: Option<i64>,
) -> Result<()> {
    let Some(url) = game.url.as_deref() else {
        return Ok(());
    };
    let (eco_url, eco_code) = game.eco_reference();

    sqlx::query(
        r#"
        INSERT INTO games (
            url, pgn, time_control, start_time, end_time, rated, time_class, rules,
            eco_url, eco_code, fen, initial_setup, tcn,
            white_accuracy, black_accuracy,
            white_player_id, white_rating, white_result, white_uuid,
            black_player_id, black_rating, black_result, black_uuid,
            archive_id, created_at
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8,
            $9, $10, $11, $12, $13,
            $14, $15,
            $16, $17, $18, $19,
            $20, $21, $22, $23,
            $24, $25
        )
        ON CONFLICT (url) DO UPDATE SET
            pgn = EXCLUDED.pgn,
            time_control = EXCLUDED.time_control,
            end_time = EXCLUDED.end_time,
            rated = EXCLUDED.rated,
            time_class = EXCLUDED.time_class,
            rules = EXCLUDED.rules,
            eco_url = EXCLUDED.eco_url,
            eco_code = EXCLUDED.eco_code,
            fen = EXCLUDED.fen,
            initial_setup = EXCLUDED.initial_setup,
            tcn = EXCLUDED.tcn,
            white_accuracy = EXCLUDED.white_accuracy,
            black_accuracy = EXCLUDED.black_accuracy,
            white_player_id = COALESCE(EXCLUDED.white_player_id, games.white_player_id),
            black_player_id = COALESCE(EXCLUDED.black_player_id, games.black_player_id),
            white_rating = EXCLUDED.white_rating,
            black_rating = EXCLUDED.black_rating,
            white_result = EXCLUDED.white_result,
            black_result = EXCLUDED.black_result,
            archive_id = EXCLUDED.archive_id
        "#,
    )
    .bind(url)
    .bind(&game.pgn)
    .bind(&game.time_control)
    .bind(game.start_time)
    .bind(game.end_time)
    .bind(game.rated)
    .bind(&game.time_class)
    .bind(&game.rules)
    .bind(eco_url)
    .bind(eco_code)
    .bind(&game.fen)
    .bind(&game.initial_setup)
    .bind(&game.tcn)
    .bind(game.accuracies.white)
    .bind(game.accuracies.black)
    .bind(white_player_id)
    .bind(game.white.rating)
    .bind(&game.white.result)
    .bind(&game.white.uuid)
    .bind(black_player_id)
    .bind(game.black.rating)
    .bind(&game.black.result)
    .bind(&game.black.uuid)
    .bind(archive_id)
    .bind(epoch_now())
    .execute(pool)
    .await?;

    Ok(())
}
