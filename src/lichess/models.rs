//! Serde models for the lichess `/user/{username}` payload, which carries
//! profile and per-perf ratings in a single document.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LichessUser {
    /// Lowercase account id; the natural key.
    pub id: String,
    /// Display casing of the username.
    pub username: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub patron: bool,
    #[serde(default)]
    pub tos_violation: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub verified: bool,
    /// Epoch milliseconds.
    pub created_at: Option<i64>,
    /// Epoch milliseconds.
    pub seen_at: Option<i64>,
    #[serde(default)]
    pub play_time: Option<PlayTime>,
    pub url: Option<String>,
    #[serde(default)]
    pub profile: Option<LichessProfile>,
    pub flair: Option<String>,
    #[serde(default)]
    pub perfs: BTreeMap<String, LichessPerf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayTime {
    pub total: Option<i64>,
    pub tv: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LichessProfile {
    pub bio: Option<String>,
    pub country: Option<String>,
}

/// One per-perf rating block. Entries without a rating (puzzle storm and
/// friends) are skipped by the upsert.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LichessPerf {
    pub rating: Option<i32>,
    pub rd: Option<i32>,
    pub prog: Option<i32>,
    pub games: Option<i32>,
    #[serde(default)]
    pub prov: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_parses_with_ratingless_perfs() {
        let user: LichessUser = serde_json::from_value(json!({
            "id": "bob",
            "username": "Bob",
            "createdAt": 1290415680000i64,
            "perfs": {
                "blitz": {"games": 100, "rating": 1800, "rd": 45, "prog": -5},
                "storm": {"runs": 30, "score": 40},
            },
            "playTime": {"total": 3600, "tv": 0},
        }))
        .unwrap();
        assert_eq!(user.perfs["blitz"].rating, Some(1800));
        assert_eq!(user.perfs["storm"].rating, None);
        assert_eq!(user.created_at, Some(1290415680000));
    }
}
