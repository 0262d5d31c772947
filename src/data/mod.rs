//! Persistence layer: idempotent upserts and the job store.
//!
//! Every function here is safe to re-run with the same input; conflict
//! targets are the natural keys listed in the schema and merge rules never
//! let an absent API field null out previously-populated state.

pub mod archives;
pub mod fetch_log;
pub mod games;
pub mod jobs;
pub mod lichess;
pub mod models;
pub mod players;
pub mod stats;

use chrono::Utc;

/// Current time as whole seconds since the Unix epoch.
pub fn epoch_now() -> i64 {
    Utc::now().timestamp()
}

/// Current time as milliseconds since the Unix epoch (lichess mirror tables).
pub fn epoch_now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
