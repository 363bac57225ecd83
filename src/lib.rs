//! Shop Vision - auto-repair shop ledger with a cached object-detection API
//!
//! The ledger tracks customers, vehicles, service orders and parts; the
//! detection endpoints run images through a pluggable inference engine and
//! keep recent results in a short-lived cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod detection;
pub mod error;
pub mod ledger;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::AppError;
pub use tasks::spawn_cleanup_task;
