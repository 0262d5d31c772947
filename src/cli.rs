use clap::{Parser, Subcommand};

/// Chess ingestion pipeline
///
/// Discovers player profiles, rating stats, monthly game archives and
/// individual games from the public chess platform APIs and materializes
/// them into PostgreSQL through a persistent job queue.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enqueue seed jobs for one or more chess.com usernames
    Enqueue {
        /// Username(s) to seed; repeat the flag for multiple
        #[arg(long = "username", required = true)]
        usernames: Vec<String>,
    },
    /// Run the ingestion worker
    Run {
        /// Process at most one job, then exit (useful for cron)
        #[arg(long)]
        once: bool,
        /// Run continuously until interrupted
        #[arg(long = "loop", conflicts_with = "once")]
        keep_running: bool,
    },
    /// Refresh one or more lichess users (profile + per-perf ratings)
    Lichess {
        /// Username(s) to refresh; repeat the flag for multiple
        #[arg(long = "username", required = true)]
        usernames: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enqueue_with_repeated_usernames() {
        let args = Args::try_parse_from([
            "chessfeed", "enqueue", "--username", "alice", "--username", "bob",
        ])
        .unwrap();
        match args.command {
            Command::Enqueue { usernames } => assert_eq!(usernames, vec!["alice", "bob"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_run_loop() {
        let args = Args::try_parse_from(["chessfeed", "run", "--loop"]).unwrap();
        match args.command {
            Command::Run { once, keep_running } => {
                assert!(!once);
                assert!(keep_running);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_once_and_loop_conflict() {
        assert!(Args::try_parse_from(["chessfeed", "run", "--once", "--loop"]).is_err());
    }

    #[test]
    fn enqueue_requires_a_username() {
        assert!(Args::try_parse_from(["chessfeed", "enqueue"]).is_err());
    }
}
