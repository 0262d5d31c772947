//! Configuration for the ingestion pipeline.
//!
//! All settings come from the environment (loaded with figment's `Env`
//! provider, so `.env` files work through dotenvy). Duration-typed fields
//! take either a plain number of seconds or a string with a unit suffix.

use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Log level for this crate's target specifically.
    ///
    /// Valid values are: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Database connection URL
    pub database_url: String,

    /// Base URL of the chess.com public API
    #[serde(default = "default_chess_api_base_url")]
    pub chess_api_base_url: String,
    /// User-Agent sent on every chess.com request (platform policy requires
    /// an identifying contact string)
    #[serde(default = "default_user_agent")]
    pub chess_api_user_agent: String,
    /// Per-request timeout for chess.com calls
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub chess_api_timeout: Duration,

    /// Base URL of the lichess public API
    #[serde(default = "default_lichess_api_base_url")]
    pub lichess_api_base_url: String,
    /// User-Agent sent on every lichess request
    #[serde(default = "default_user_agent")]
    pub lichess_api_user_agent: String,
    /// Per-request timeout for lichess calls
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub lichess_api_timeout: Duration,

    /// Minimum interval between two successful profile refreshes per player
    #[serde(default = "default_profile_refresh_seconds")]
    pub profile_refresh_seconds: i64,
    /// Minimum interval between two successful stats refreshes per player
    #[serde(default = "default_stats_refresh_seconds")]
    pub stats_refresh_seconds: i64,
    /// Minimum interval between two successful archive scans per player
    #[serde(default = "default_archive_refresh_seconds")]
    pub archive_refresh_seconds: i64,
    /// Only the most recent N monthly archives are ingested (0 = unlimited)
    #[serde(default = "default_archive_month_limit")]
    pub archive_month_limit: usize,
    /// Queue priority assigned to games jobs spawned by archive discovery
    #[serde(default = "default_archive_job_priority")]
    pub archive_job_priority: i32,

    /// How long a worker sleeps when the queue is empty
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub ingestion_poll_seconds: Duration,
    /// Number of concurrent worker tasks in loop mode
    #[serde(default = "default_worker_count")]
    pub ingestion_worker_count: usize,
    /// Age after which a locked job is considered abandoned and requeued.
    ///
    /// Must comfortably exceed the slowest expected handler (games jobs on
    /// large archives).
    #[serde(default = "default_lock_expiry_seconds")]
    pub ingestion_lock_expiry_seconds: i64,
    /// Graceful shutdown timeout
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_chess_api_base_url() -> String {
    "https://api.chess.com/pub".to_string()
}

fn default_lichess_api_base_url() -> String {
    "https://lichess.org/api".to_string()
}

fn default_user_agent() -> String {
    "ChessPipeline/0.1 (contact@example.com)".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Default profile cadence of 6 hours
fn default_profile_refresh_seconds() -> i64 {
    6 * 3600
}

/// Default stats cadence of 2 hours
fn default_stats_refresh_seconds() -> i64 {
    2 * 3600
}

/// Default archive-scan cadence of 12 hours
fn default_archive_refresh_seconds() -> i64 {
    12 * 3600
}

fn default_archive_month_limit() -> usize {
    12
}

fn default_archive_job_priority() -> i32 {
    5
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_worker_count() -> usize {
    1
}

/// Default lock expiry of 30 minutes
fn default_lock_expiry_seconds() -> i64 {
    30 * 60
}

/// Eight seconds to drain in-progress jobs before tasks are abandoned
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// Parser behind the duration-typed env vars. A bare number means seconds;
/// `ms`, `s`, `m` and `h` suffixes (fractions allowed, e.g. "1.5h") pick
/// another unit.
const ENV_DURATION: DurationParser<'static> = DurationParser::builder()
    .time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
    .default_unit(TimeUnit::Second)
    .disable_infinity()
    .disable_exponent()
    .build();

/// What a duration-typed config field may hold before interpretation.
/// figment's env provider hands us strings; defaults and test fixtures may
/// supply plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    ENV_DURATION
        .parse(text)
        .map_err(|e| format!("unusable duration '{text}': {e} (try '15', '30s' or '2m')"))?
        .try_into()
        .map_err(|e| format!("duration '{text}' does not fit: {e}"))
}
