//! Durable ingestion pipeline keeping PostgreSQL in sync with the public
//! chess.com and lichess APIs.
//!
//! The core is a database-backed job queue (`data::jobs`) drained by one or
//! more workers (`worker`). Jobs fetch JSON from the upstream platform,
//! translate it into normalized rows (`data`), and enqueue follow-on work:
//! a profile refresh fans out into stats and archive-discovery jobs, and
//! each newly-discovered monthly archive fans out into a games job. All
//! writes are idempotent upserts, so at-least-once delivery is safe.

pub mod chess;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod lichess;
pub mod worker;
