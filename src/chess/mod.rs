//! chess.com platform adapter: HTTP client and response models.

pub mod api;
pub mod models;

pub use api::ChessApi;
