//! Row types and database enums.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of work an ingestion job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Profile,
    Stats,
    Archives,
    Games,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Profile => "profile",
            JobKind::Stats => "stats",
            JobKind::Archives => "archives",
            JobKind::Games => "games",
        }
    }
}

/// Queue lifecycle of a job. `succeeded` and `cancelled` are terminal and
/// never revived by a duplicate enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Locked,
    Succeeded,
    Failed,
    Cancelled,
}

/// Fetch progress of a monthly archive. `succeeded` is sticky: rediscovery
/// never resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "archive_fetch_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFetchStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

/// One persistent unit of work from `ingestion_jobs`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionJob {
    pub id: i64,
    pub player_id: Option<i64>,
    pub job_type: JobKind,
    /// Structured scope: at least a username, plus archive coordinates for
    /// games jobs.
    pub scope: Value,
    pub dedupe_key: String,
    pub status: JobStatus,
    /// Lower number = more urgent.
    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Earliest epoch second a worker may claim this job.
    pub available_at: i64,
    pub locked_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
    pub created_at: i64,
}
