//! lichess platform adapter: HTTP client, response models, and the one-shot
//! refresh used by the `lichess` CLI command.

pub mod api;
pub mod models;

pub use api::LichessApi;

use crate::data;
use crate::error::Result;
use sqlx::PgPool;
use tracing::info;

/// Fetch a lichess user and materialize profile, per-perf ratings and the
/// ingestion-state row. Returns the internal player id.
pub async fn refresh_user(api: &LichessApi, pool: &PgPool, username: &str) -> Result<i64> {
    let user = api.fetch_user(username).await?;
    let player_id = data::lichess::upsert_lichess_player(pool, &user).await?;
    data::lichess::upsert_lichess_player_stats(pool, player_id, &user.perfs).await?;
    data::lichess::touch_lichess_ingestion_state(pool, player_id, true, "idle", None).await?;
    info!(username = %username, player_id, "Refreshed lichess user");
    Ok(player_id)
}
