//! Executes claimed jobs: fetch, upsert, state touch, cascading enqueue.
//!
//! Handlers never call each other; all fan-out goes through the queue, so
//! each handler is independently replayable. Every write is an idempotent
//! upsert, which makes re-processing after a mid-job crash safe.

use crate::chess::ChessApi;
use crate::config::Config;
use crate::data::models::{IngestionJob, JobKind};
use crate::data::players::RefreshKind;
use crate::data::{archives, games, jobs, players, stats};
use crate::error::{IngestError, Result};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Scope carried by profile, stats and archives jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshScope {
    pub username: Option<String>,
}

/// Scope carried by games jobs; the archive coordinates are mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct GamesScope {
    pub username: Option<String>,
    pub archive_url: String,
    pub year: i32,
    pub month: i32,
}

/// A job's kind and scope parsed into a typed request. Parsing failures are
/// permanent: no retry will grow the missing fields.
#[derive(Debug, Clone)]
pub enum JobRequest {
    Profile(RefreshScope),
    Stats(RefreshScope),
    Archives(RefreshScope),
    Games(GamesScope),
}

pub fn parse_request(job: &IngestionJob) -> Result<JobRequest> {
    let scope = job.scope.clone();
    let invalid = |e: serde_json::Error| IngestError::Scope(e.to_string());
    match job.job_type {
        JobKind::Profile => Ok(JobRequest::Profile(
            serde_json::from_value(scope).map_err(invalid)?,
        )),
        JobKind::Stats => Ok(JobRequest::Stats(
            serde_json::from_value(scope).map_err(invalid)?,
        )),
        JobKind::Archives => Ok(JobRequest::Archives(
            serde_json::from_value(scope).map_err(invalid)?,
        )),
        JobKind::Games => Ok(JobRequest::Games(
            serde_json::from_value(scope).map_err(invalid)?,
        )),
    }
}

/// Year and month from the trailing path segments of an archive URL.
pub(crate) fn parse_year_month(archive_url: &str) -> Option<(i32, i32)> {
    let parsed = Url::parse(archive_url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    let [.., year, month] = segments.as_slice() else {
        return None;
    };
    Some((year.parse().ok()?, month.parse().ok()?))
}

/// Dispatches claimed jobs to their handler.
pub struct JobProcessor {
    pool: PgPool,
    api: Arc<ChessApi>,
    config: Arc<Config>,
}

impl JobProcessor {
    pub fn new(pool: PgPool, api: Arc<ChessApi>, config: Arc<Config>) -> Self {
        Self { pool, api, config }
    }

    pub async fn process(&self, job: &IngestionJob) -> Result<()> {
        match parse_request(job)? {
            JobRequest::Profile(scope) => self.process_profile(job, scope).await,
            JobRequest::Stats(scope) => self.process_stats(job, scope).await,
            JobRequest::Archives(scope) => self.process_archives(job, scope).await,
            JobRequest::Games(scope) => self.process_games(job, scope).await,
        }
    }

    /// Username from the scope, falling back to a lookup by the job's
    /// player reference. Failing both is permanent.
    async fn resolve_username(
        &self,
        job: &IngestionJob,
        scope_username: Option<&str>,
    ) -> Result<String> {
        if let Some(username) = scope_username {
            if !username.is_empty() {
                return Ok(username.to_lowercase());
            }
        }
        if let Some(player_id) = job.player_id {
            if let Some(username) =
                players::find_username_by_player_id(&self.pool, player_id).await?
            {
                return Ok(username);
            }
        }
        Err(IngestError::Scope(
            "job has no username and no resolvable player".to_string(),
        ))
    }

    /// Return the internal id for a username, fetching and upserting the
    /// profile if the player is not known locally.
    ///
    /// Two handlers may race here for the same opponent; the upsert keyed
    /// on the platform player id converges and both observe one row.
    async fn ensure_player(&self, username: &str) -> Result<i64> {
        let username = username.to_lowercase();
        if let Some(id) = players::find_player_id_by_username(&self.pool, &username).await? {
            return Ok(id);
        }

        info!(username = %username, "Player missing locally; fetching profile lazily");
        let profile = self.api.fetch_profile(&username).await?;
        let player_id = players::upsert_player(&self.pool, &profile).await?;
        players::touch_ingestion_state(&self.pool, player_id, None, "idle", None).await?;
        Ok(player_id)
    }

    async fn process_profile(&self, job: &IngestionJob, scope: RefreshScope) -> Result<()> {
        let username = self.resolve_username(job, scope.username.as_deref()).await?;
        info!(username = %username, "Refreshing profile");

        let profile = self.api.fetch_profile(&username).await?;
        let player_id = players::upsert_player(&self.pool, &profile).await?;
        players::touch_ingestion_state(
            &self.pool,
            player_id,
            Some((RefreshKind::Profile, self.config.profile_refresh_seconds)),
            "idle",
            None,
        )
        .await?;

        let owner = job.player_id.unwrap_or(player_id);
        let scope = json!({ "username": username });
        jobs::enqueue(
            &self.pool,
            JobKind::Stats,
            Some(owner),
            scope.clone(),
            2,
            0,
            jobs::DEFAULT_MAX_ATTEMPTS,
        )
        .await?;
        jobs::enqueue(
            &self.pool,
            JobKind::Archives,
            Some(owner),
            scope,
            3,
            0,
            jobs::DEFAULT_MAX_ATTEMPTS,
        )
        .await?;
        Ok(())
    }

    async fn process_stats(&self, job: &IngestionJob, scope: RefreshScope) -> Result<()> {
        let username = self.resolve_username(job, scope.username.as_deref()).await?;
        info!(username = %username, "Refreshing stats");

        let response = self.api.fetch_stats(&username).await?;
        let player_id = match job.player_id {
            Some(id) => id,
            None => self.ensure_player(&username).await?,
        };
        stats::upsert_player_stats(&self.pool, player_id, &response).await?;
        players::touch_ingestion_state(
            &self.pool,
            player_id,
            Some((RefreshKind::Stats, self.config.stats_refresh_seconds)),
            "idle",
            None,
        )
        .await?;
        Ok(())
    }

    async fn process_archives(&self, job: &IngestionJob, scope: RefreshScope) -> Result<()> {
        let username = self.resolve_username(job, scope.username.as_deref()).await?;
        info!(username = %username, "Refreshing archives");

        let mut archive_urls = self.api.fetch_archives(&username).await?;
        let total = archive_urls.len();
        let limit = self.config.archive_month_limit;
        if limit > 0 && total > limit {
            archive_urls = archive_urls.split_off(total - limit);
            info!(
                username = %username,
                limit,
                total,
                "Limiting archives to the most recent months"
            );
        }

        let player_id = match job.player_id {
            Some(id) => id,
            None => self.ensure_player(&username).await?,
        };

        let mut new_jobs = 0;
        for archive_url in &archive_urls {
            let Some((year, month)) = parse_year_month(archive_url) else {
                warn!(archive_url = %archive_url, "Could not parse archive path");
                continue;
            };

            let (_archive_id, inserted) = archives::upsert_monthly_archive(
                &self.pool,
                player_id,
                year,
                month,
                archive_url,
                self.config.archive_job_priority,
            )
            .await?;

            if inserted {
                let scope = json!({
                    "username": username,
                    "archive_url": archive_url,
                    "year": year,
                    "month": month,
                });
                jobs::enqueue(
                    &self.pool,
                    JobKind::Games,
                    Some(player_id),
                    scope,
                    self.config.archive_job_priority,
                    0,
                    jobs::DEFAULT_MAX_ATTEMPTS,
                )
                .await?;
                new_jobs += 1;
            }
        }

        players::touch_ingestion_state(
            &self.pool,
            player_id,
            Some((RefreshKind::Archives, self.config.archive_refresh_seconds)),
            "idle",
            None,
        )
        .await?;
        info!(new_jobs, "Archive refresh complete");
        Ok(())
    }

    async fn process_games(&self, job: &IngestionJob, scope: GamesScope) -> Result<()> {
        let username = self.resolve_username(job, scope.username.as_deref()).await?;
        info!(
            username = %username,
            year = scope.year,
            month = scope.month,
            "Fetching games"
        );

        let data = self.api.fetch_archive_games(&scope.archive_url).await?;

        let player_id = match job.player_id {
            Some(id) => id,
            None => self.ensure_player(&username).await?,
        };
        let archive_id = archives::find_archive_id(&self.pool, player_id, scope.year, scope.month)
            .await?
            .ok_or(IngestError::Database(sqlx::Error::RowNotFound))?;

        archives::mark_archive_in_flight(&self.pool, archive_id).await?;

        let mut stored = 0usize;
        for game in &data.games {
            let white_username = game.white.username.as_deref().map(str::to_lowercase);
            let black_username = game.black.username.as_deref().map(str::to_lowercase);

            let white_id = match &white_username {
                Some(u) => Some(self.ensure_player(u).await?),
                None => None,
            };
            let black_id = match &black_username {
                Some(u) => Some(self.ensure_player(u).await?),
                None => None,
            };

            games::upsert_game(&self.pool, game, archive_id, white_id, black_id).await?;
            stored += 1;
        }

        info!(
            stored,
            year = scope.year,
            month = scope.month,
            "Stored games"
        );
        archives::mark_archive_succeeded(&self.pool, player_id, scope.year, scope.month).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::JobStatus;

    fn job(kind: JobKind, scope: serde_json::Value) -> IngestionJob {
        IngestionJob {
            id: 1,
            player_id: None,
            job_type: kind,
            scope,
            dedupe_key: String::new(),
            status: JobStatus::Locked,
            priority: 5,
            attempts: 1,
            max_attempts: 5,
            available_at: 0,
            locked_at: None,
            completed_at: None,
            error: None,
            created_at: 0,
        }
    }

    #[test]
    fn games_scope_requires_archive_coordinates() {
        let err = parse_request(&job(JobKind::Games, json!({"username": "alice"}))).unwrap_err();
        assert!(err.is_permanent(), "missing scope fields must be permanent");
    }

    #[test]
    fn games_scope_parses_when_complete() {
        let request = parse_request(&job(
            JobKind::Games,
            json!({
                "username": "alice",
                "archive_url": "https://api.chess.com/pub/player/alice/games/2024/01",
                "year": 2024,
                "month": 1,
            }),
        ))
        .unwrap();
        match request {
            JobRequest::Games(scope) => {
                assert_eq!(scope.year, 2024);
                assert_eq!(scope.month, 1);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn refresh_scope_tolerates_missing_username() {
        let request = parse_request(&job(JobKind::Profile, json!({}))).unwrap();
        match request {
            JobRequest::Profile(scope) => assert!(scope.username.is_none()),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn year_month_parsed_from_trailing_segments() {
        assert_eq!(
            parse_year_month("https://api.chess.com/pub/player/alice/games/2024/01"),
            Some((2024, 1))
        );
        assert_eq!(
            parse_year_month("https://api.chess.com/pub/player/alice/games/2024/12/"),
            Some((2024, 12))
        );
    }

    #[test]
    fn year_month_rejects_malformed_paths() {
        assert_eq!(
            parse_year_month("https://api.chess.com/pub/player/alice/games/latest"),
            None
        );
        assert_eq!(parse_year_month("not a url"), None);
        assert_eq!(parse_year_month("https://example.com/"), None);
    }
}
