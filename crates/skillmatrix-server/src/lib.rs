//! Skill Matrix Server Library
//!
//! HTTP surface for user ingestion: single-user creation, chunked bulk
//! ingestion through the work queue, health and metrics.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use state::AppState;
