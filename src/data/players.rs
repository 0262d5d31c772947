//! Player rows and the per-player ingestion state.

use crate::chess::models::Profile;
use crate::data::epoch_now;
use crate::error::{IngestError, Result};
use sqlx::PgPool;

/// Which refresh type a state touch records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    Profile,
    Stats,
    Archives,
}

/// Insert or update a player from a profile document, returning the
/// internal player id.
///
/// Keyed on the platform player id. Fields the API sometimes omits
/// (display casing, avatar, twitch URL, join date) never overwrite an
/// existing value with NULL.
pub async fn upsert_player(pool: &PgPool, profile: &Profile) -> Result<i64> {
    let username = profile.lowercase_username();
    let Some(platform_id) = profile.player_id else {
        return Err(IngestError::Decode(
            "profile missing player_id".to_string(),
        ));
    };
    if username.is_empty() {
        return Err(IngestError::Decode("profile missing username".to_string()));
    }

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO players (
            chesscom_player_id, username, display_username, name, title, status, league,
            country_url, country_code, avatar, twitch_url, followers, joined, last_online,
            is_streamer, verified, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
        ON CONFLICT (chesscom_player_id) DO UPDATE SET
            username = EXCLUDED.username,
            display_username = COALESCE(EXCLUDED.display_username, players.display_username),
            name = EXCLUDED.name,
            title = EXCLUDED.title,
            status = EXCLUDED.status,
            league = EXCLUDED.league,
            country_url = EXCLUDED.country_url,
            country_code = EXCLUDED.country_code,
            avatar = COALESCE(EXCLUDED.avatar, players.avatar),
            twitch_url = COALESCE(EXCLUDED.twitch_url, players.twitch_url),
            followers = EXCLUDED.followers,
            joined = COALESCE(EXCLUDED.joined, players.joined),
            last_online = EXCLUDED.last_online,
            is_streamer = EXCLUDED.is_streamer,
            verified = EXCLUDED.verified,
            updated_at = EXCLUDED.updated_at
        RETURNING id
        "#,
    )
    .bind(platform_id)
    .bind(&username)
    .bind(&profile.username)
    .bind(&profile.name)
    .bind(&profile.title)
    .bind(&profile.status)
    .bind(&profile.league)
    .bind(&profile.country)
    .bind(profile.country_code())
    .bind(&profile.avatar)
    .bind(profile.twitch_stream_url())
    .bind(profile.followers)
    .bind(profile.joined)
    .bind(profile.last_online)
    .bind(profile.is_streamer)
    .bind(profile.verified)
    .bind(epoch_now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Update the ingestion-state row for a player, creating it if missing.
///
/// When `refreshed` is set, the matching last/next timestamp pair is
/// written with `next = now + cadence`; all other pairs are preserved
/// (COALESCE). Status and error are always overwritten.
pub async fn touch_ingestion_state(
    pool: &PgPool,
    player_id: i64,
    refreshed: Option<(RefreshKind, i64)>,
    status: &str,
    error: Option<&str>,
) -> Result<()> {
    let now = epoch_now();
    let pair = |kind: RefreshKind| match refreshed {
        Some((touched, cadence)) if touched == kind => (Some(now), Some(now + cadence)),
        _ => (None, None),
    };
    let (last_profile, next_profile) = pair(RefreshKind::Profile);
    let (last_stats, next_stats) = pair(RefreshKind::Stats);
    let (last_archives, next_archives) = pair(RefreshKind::Archives);

    sqlx::query(
        r#"
        INSERT INTO player_ingestion_state (
            player_id, last_profile_fetch, next_profile_fetch,
            last_stats_fetch, next_stats_fetch,
            last_archives_scan, next_archives_scan, status, error, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (player_id) DO UPDATE SET
            last_profile_fetch = COALESCE(EXCLUDED.last_profile_fetch, player_ingestion_state.last_profile_fetch),
            next_profile_fetch = COALESCE(EXCLUDED.next_profile_fetch, player_ingestion_state.next_profile_fetch),
            last_stats_fetch = COALESCE(EXCLUDED.last_stats_fetch, player_ingestion_state.last_stats_fetch),
            next_stats_fetch = COALESCE(EXCLUDED.next_stats_fetch, player_ingestion_state.next_stats_fetch),
            last_archives_scan = COALESCE(EXCLUDED.last_archives_scan, player_ingestion_state.last_archives_scan),
            next_archives_scan = COALESCE(EXCLUDED.next_archives_scan, player_ingestion_state.next_archives_scan),
            status = EXCLUDED.status,
            error = EXCLUDED.error,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(player_id)
    .bind(last_profile)
    .bind(next_profile)
    .bind(last_stats)
    .bind(next_stats)
    .bind(last_archives)
    .bind(next_archives)
    .bind(status)
    .bind(error)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up the internal id for a lowercase username.
pub async fn find_player_id_by_username(pool: &PgPool, username: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM players WHERE username = $1")
        .bind(username.to_lowercase())
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

pub async fn find_username_by_player_id(pool: &PgPool, player_id: i64) -> Result<Option<String>> {
    let username = sqlx::query_scalar::<_, String>("SELECT username FROM players WHERE id = $1")
        .bind(player_id)
        .fetch_optional(pool)
        .await?;
    Ok(username)
}
