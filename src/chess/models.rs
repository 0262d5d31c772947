//! Serde models for the chess.com public API payloads.
//!
//! The upstream omits fields freely, so almost everything is optional; the
//! upsert layer decides which absences are allowed to overwrite state.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// `/player/{username}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub username: String,
    pub player_id: Option<i64>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub league: Option<String>,
    /// URL whose last path segment is the two-letter country code.
    pub country: Option<String>,
    pub avatar: Option<String>,
    pub twitch_url: Option<String>,
    pub followers: Option<i64>,
    pub joined: Option<i64>,
    pub last_online: Option<i64>,
    #[serde(default)]
    pub is_streamer: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub streaming_platforms: Vec<StreamingPlatform>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamingPlatform {
    pub platform: Option<String>,
    pub url: Option<String>,
}

impl Profile {
    /// Case-normalized username used as the lookup key.
    pub fn lowercase_username(&self) -> String {
        self.username.to_lowercase()
    }

    /// Two-letter country code from the country URL's last path segment.
    pub fn country_code(&self) -> Option<String> {
        self.country
            .as_deref()
            .filter(|url| url.contains('/'))
            .and_then(|url| url.rsplit('/').next())
            .filter(|code| !code.is_empty())
            .map(|code| code.to_uppercase())
    }

    /// Twitch URL, preferring the streaming-platforms list over the legacy
    /// top-level field.
    pub fn twitch_stream_url(&self) -> Option<String> {
        self.streaming_platforms
            .iter()
            .find(|p| {
                p.platform
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case("twitch"))
            })
            .and_then(|p| p.url.clone())
            .or_else(|| self.twitch_url.clone())
    }
}

/// `/player/{username}/stats` response.
///
/// Per-mode entries are keyed dynamically (`chess_rapid`, `chess960_blitz`,
/// ...), so they stay as raw values until [`mode_key_parts`] and
/// [`ModeStats`] pick them apart.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub tactics: Option<SpreadStats>,
    #[serde(default)]
    pub lessons: Option<SpreadStats>,
    #[serde(default)]
    pub puzzle_rush: Option<PuzzleRush>,
    #[serde(flatten)]
    pub modes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModeStats {
    #[serde(default)]
    pub last: Option<RatingSample>,
    #[serde(default)]
    pub best: Option<BestSample>,
    #[serde(default)]
    pub record: Option<Record>,
    pub time_per_move: Option<i32>,
    pub timeout_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatingSample {
    pub rating: Option<i32>,
    pub date: Option<i64>,
    pub rd: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BestSample {
    pub rating: Option<i32>,
    pub date: Option<i64>,
    /// URL of the game the best rating was reached in.
    pub game: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Record {
    pub win: Option<i32>,
    pub loss: Option<i32>,
    pub draw: Option<i32>,
}

/// Highest/lowest rating pair used by the tactics and lessons sub-stats.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpreadStats {
    #[serde(default)]
    pub highest: Option<RatingSample>,
    #[serde(default)]
    pub lowest: Option<RatingSample>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PuzzleRush {
    #[serde(default)]
    pub best: Option<RushScore>,
    #[serde(default)]
    pub daily: Option<RushScore>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RushScore {
    pub total_attempts: Option<i32>,
    pub score: Option<i32>,
}

/// Splits a `chess_rapid`-style stats key into (rules, time class).
pub fn mode_key_parts(key: &str) -> (&'static str, &str) {
    let time_class = key.rsplit('_').next().unwrap_or(key);
    let rules = if key.contains("960") { "chess960" } else { "chess" };
    (rules, time_class)
}

/// `/player/{username}/games/archives` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchivesResponse {
    /// Monthly archive URLs, each ending in `/YYYY/MM`.
    pub archives: Vec<String>,
}

/// Response body of a monthly archive URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveGamesResponse {
    #[serde(default)]
    pub games: Vec<ArchiveGame>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveGame {
    pub url: Option<String>,
    pub pgn: Option<String>,
    pub time_control: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    #[serde(default)]
    pub rated: bool,
    pub time_class: Option<String>,
    pub rules: Option<String>,
    pub eco: Option<String>,
    pub eco_url: Option<String>,
    pub fen: Option<String>,
    pub initial_setup: Option<String>,
    pub tcn: Option<String>,
    #[serde(default)]
    pub white: GameSide,
    #[serde(default)]
    pub black: GameSide,
    #[serde(default)]
    pub accuracies: Accuracies,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameSide {
    pub username: Option<String>,
    pub rating: Option<i32>,
    pub result: Option<String>,
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Accuracies {
    pub white: Option<f64>,
    pub black: Option<f64>,
}

impl ArchiveGame {
    /// (eco_url, eco_code): some responses only carry `eco` as a URL; the
    /// code is the URL's last path segment.
    pub fn eco_reference(&self) -> (Option<String>, Option<String>) {
        let eco_url = self.eco_url.clone().or_else(|| self.eco.clone());
        let eco_code = eco_url
            .as_deref()
            .filter(|url| url.contains('/'))
            .and_then(|url| url.rsplit('/').next())
            .map(str::to_string);
        (eco_url, eco_code)
    }
}
