use anyhow::Context;
use clap::Parser;
use figment::{Figment, providers::Env};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use chessfeed::chess::ChessApi;
use chessfeed::cli::{Args, Command};
use chessfeed::config::Config;
use chessfeed::data::jobs;
use chessfeed::lichess::{self, LichessApi};
use chessfeed::worker::Worker;
use chessfeed::worker::scheduler::Scheduler;
use futures::future::join_all;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config: Config = Figment::new()
        .merge(Env::raw())
        .extract()
        .context("Failed to load config")?;

    setup_logging(&config);

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    match args.command {
        Command::Enqueue { usernames } => {
            for username in usernames {
                jobs::enqueue_seed_jobs(&pool, &username).await?;
            }
        }
        Command::Run { keep_running, .. } => {
            let config = Arc::new(config);
            let api = Arc::new(ChessApi::new(&config, pool.clone())?);
            if keep_running {
                run_loop(pool, api, config).await?;
            } else {
                let worker = Worker::new(0, pool, api, config);
                worker.run_once().await?;
            }
        }
        Command::Lichess { usernames } => {
            let api = LichessApi::new(&config, pool.clone())?;
            for username in usernames {
                lichess::refresh_user(&api, &pool, &username).await?;
            }
        }
    }

    Ok(())
}

/// Spawn the scheduler and the worker pool, then wait for SIGINT and shut
/// everything down within the configured timeout.
async fn run_loop(pool: PgPool, api: Arc<ChessApi>, config: Arc<Config>) -> anyhow::Result<()> {
    // Recover jobs stranded in `locked` by a previous unclean shutdown
    match jobs::release_stale_locks(&pool, config.ingestion_lock_expiry_seconds).await {
        Ok(0) => {}
        Ok(count) => warn!(count, "Released stale job locks from previous run"),
        Err(e) => warn!(error = %e, "Failed to release stale job locks"),
    }

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    let scheduler = Scheduler::new(pool.clone(), config.clone());
    let scheduler_shutdown = shutdown.clone();
    handles.push(tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    }));

    for id in 0..config.ingestion_worker_count.max(1) {
        let worker = Worker::new(id, pool.clone(), api.clone(), config.clone());
        let worker_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            worker.run(worker_shutdown).await;
        }));
    }
    info!(
        worker_count = config.ingestion_worker_count.max(1),
        "Worker tasks running"
    );

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    // In-progress jobs get until the deadline to finish; anything still
    // running after that is abandoned and its lock falls to the stale sweep.
    match tokio::time::timeout(config.shutdown_timeout, join_all(handles)).await {
        Ok(results) => {
            let panicked = results.iter().filter(|joined| joined.is_err()).count();
            if panicked == 0 {
                info!("All tasks stopped cleanly");
            } else {
                warn!(panicked, "Worker tasks crashed before shutdown completed");
            }
        }
        Err(_) => warn!(
            timeout = ?config.shutdown_timeout,
            "Shutdown deadline elapsed; abandoning remaining tasks"
        ),
    }

    Ok(())
}

/// Configure and initialize logging for the application.
fn setup_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,chessfeed={}", config.log_level)));

    let subscriber = FmtSubscriber::builder()
        .with_target(true)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}
