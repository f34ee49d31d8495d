//! HTTP request handlers.

mod health;
mod users;

pub use health::{health_check, metrics_handler};
pub use users::{create_bulk_users, create_users};
