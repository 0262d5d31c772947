//! Worker loop: claims jobs from the queue and runs them through the
//! processor, marking success or scheduling a retry.

pub mod processor;
pub mod scheduler;

use crate::chess::ChessApi;
use crate::config::Config;
use crate::data::models::IngestionJob;
use crate::data::{jobs, players};
use crate::error::{IngestError, Result};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use self::processor::JobProcessor;

/// A single worker instance.
///
/// Each worker runs in its own task and polls the shared queue; claim
/// semantics in the job store guarantee that concurrent workers never
/// process the same job.
pub struct Worker {
    id: usize, // distinguishes workers in log output
    pool: PgPool,
    processor: JobProcessor,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(id: usize, pool: PgPool, api: Arc<ChessApi>, config: Arc<Config>) -> Self {
        let poll_interval = config.ingestion_poll_seconds;
        Self {
            id,
            pool: pool.clone(),
            processor: JobProcessor::new(pool, api, config),
            poll_interval,
        }
    }

    /// Runs the worker's main loop until the shutdown token fires. An
    /// in-progress job is always allowed to finish.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(worker_id = self.id, "Worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match self.step().await {
                Ok(true) => {}
                Ok(false) => {
                    trace!(worker_id = self.id, "Queue empty, waiting");
                    tokio::select! {
                        _ = time::sleep(self.poll_interval) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
                Err(e) => {
                    warn!(worker_id = self.id, error = %e, "Queue poll failed");
                    // Wait before retrying to avoid spamming errors.
                    tokio::select! {
                        _ = time::sleep(Duration::from_secs(10)) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
            }
        }
        info!(worker_id = self.id, "Worker exiting gracefully");
    }

    /// Claim and process at most one job. Returns whether a job was
    /// processed (a failed job still counts as processed).
    pub async fn run_once(&self) -> Result<bool> {
        let processed = self.step().await?;
        if !processed {
            info!("No pending jobs; exiting");
        }
        Ok(processed)
    }

    async fn step(&self) -> Result<bool> {
        let Some(job) = jobs::claim_one(&self.pool).await? else {
            return Ok(false);
        };
        let job_id = job.id;
        debug!(worker_id = self.id, job_id, kind = ?job.job_type, "Processing job");

        match self.processor.process(&job).await {
            Ok(()) => {
                jobs::mark_success(&self.pool, job_id).await?;
                debug!(worker_id = self.id, job_id, "Job finished");
            }
            Err(e) if e.is_permanent() => {
                error!(worker_id = self.id, job_id, error = %e, "Job failed permanently");
                jobs::mark_permanent_failure(&self.pool, job_id, &e.to_string()).await?;
                self.record_state_error(&job, &e).await;
            }
            Err(e) => {
                error!(worker_id = self.id, job_id, error = %e, "Job failed");
                let delay = scheduler::retry_backoff(job.attempts);
                jobs::mark_failure(&self.pool, job_id, &e.to_string(), delay).await?;
                self.record_state_error(&job, &e).await;
            }
        }

        Ok(true)
    }

    /// Best-effort: surface the failure on the owner's ingestion-state row
    /// without disturbing its refresh timestamps.
    async fn record_state_error(&self, job: &IngestionJob, error: &IngestError) {
        let Some(player_id) = job.player_id else {
            return;
        };
        let message = error.to_string();
        if let Err(e) =
            players::touch_ingestion_state(&self.pool, player_id, None, "error", Some(message.as_str()))
                .await
        {
            warn!(player_id, error = %e, "Failed to record ingestion-state error");
        }
    }
}
