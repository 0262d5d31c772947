use chessfeed::chess::models::{ArchiveGame, Profile, StatsResponse};
use chessfeed::data::models::JobStatus;
use serde_json::json;
use sqlx::PgPool;

/// Build a profile document the way the API returns it, through real
/// deserialization.
pub fn sample_profile(username: &str, player_id: i64) -> Profile {
    serde_json::from_value(json!({
        "username": username,
        "player_id": player_id,
        "name": "Test Player",
        "status": "premium",
        "league": "Wood",
        "country": "https://api.chess.com/pub/country/us",
        "avatar": format!("https://images.chesscomfiles.com/{}.png", username.to_lowercase()),
        "followers": 10,
        "joined": 1_500_000_000,
        "last_online": 1_700_000_000,
        "is_streamer": false,
        "verified": false,
        "streaming_platforms": [],
    }))
    .unwrap()
}

/// Stats payload covering standard and 960 modes plus every sub-stat.
pub fn sample_stats() -> StatsResponse {
    serde_json::from_value(json!({
        "chess_rapid": {
            "last": {"rating": 1500, "date": 1_700_000_000, "rd": 45},
            "best": {"rating": 1620, "date": 1_690_000_000, "game": "https://www.chess.com/game/live/1"},
            "record": {"win": 10, "loss": 5, "draw": 2},
        },
        "chess960_daily": {
            "last": {"rating": 1400, "date": 1_700_000_100, "rd": 60},
            "record": {"win": 3, "loss": 1, "draw": 0},
            "time_per_move": 7200,
            "timeout_percent": 1.5,
        },
        "fide": 0,
        "tactics": {
            "highest": {"rating": 2100, "date": 1_650_000_000},
            "lowest": {"rating": 800, "date": 1_600_000_000},
        },
        "lessons": {
            "highest": {"rating": 1900, "date": 1_650_000_000},
        },
        "puzzle_rush": {
            "best": {"total_attempts": 40, "score": 38},
            "daily": {"total_attempts": 20, "score": 18},
        },
    }))
    .unwrap()
}

/// One finished game between two named players.
pub fn sample_game(url: &str, white: &str, black: &str) -> ArchiveGame {
    serde_json::from_value(json!({
        "url": url,
        "pgn": "1. e4 e5 *",
        "time_control": "600",
        "start_time": 1_700_000_000,
        "end_time": 1_700_000_600,
        "rated": true,
        "time_class": "rapid",
        "rules": "chess",
        "eco_url": "https://www.chess.com/openings/Kings-Pawn",
        "fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -",
        "tcn": "mC0K",
        "white": {"username": white, "rating": 1500, "result": "win", "uuid": "w-uuid"},
        "black": {"username": black, "rating": 1480, "result": "resigned", "uuid": "b-uuid"},
        "accuracies": {"white": 92.5, "black": 85.1},
    }))
    .unwrap()
}

/// Insert a minimal player row directly, returning the generated id.
pub async fn insert_player(pool: &PgPool, platform_id: i64, username: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO players (chesscom_player_id, username, display_username, created_at, updated_at)
         VALUES ($1, $2, $3, EXTRACT(EPOCH FROM NOW())::BIGINT, EXTRACT(EPOCH FROM NOW())::BIGINT)
         RETURNING id",
    )
    .bind(platform_id)
    .bind(username.to_lowercase())
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// (status, attempts, priority, available_at, error) of a job row.
pub async fn job_row(pool: &PgPool, job_id: i64) -> (JobStatus, i32, i32, i64, Option<String>) {
    sqlx::query_as(
        "SELECT status, attempts, priority, available_at, error FROM ingestion_jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn count_jobs(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ingestion_jobs")
        .fetch_one(pool)
        .await
        .unwrap()
}
