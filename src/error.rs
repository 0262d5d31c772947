//! Error taxonomy shared across the ingestion pipeline.

/// Errors produced while fetching, decoding, or persisting upstream data.
///
/// The worker routes on [`IngestError::is_permanent`]: permanent errors fail
/// the job outright, everything else goes back to the queue with backoff.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Transport-level failure: DNS, connect, timeout, reset.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The upstream answered with a non-200 status.
    #[error("upstream returned HTTP {status} for {url}")]
    Upstream { status: u16, url: String },
    /// A 200 response whose body could not be parsed into the expected shape.
    #[error("failed to decode upstream payload: {0}")]
    Decode(String),
    /// The job's scope document is missing required fields. Not retryable.
    #[error("invalid job scope: {0}")]
    Scope(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IngestError {
    /// Whether retrying the job could ever succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, IngestError::Scope(_))
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
