//! API Module
//!
//! HTTP handlers and routing for the shop REST API.
//!
//! # Endpoints
//! - `POST /detect-realtime` - Cached object detection
//! - `POST /detect` - Uncached object detection
//! - `GET /performance` - Detection cache counters and model status
//! - `POST /clear-cache` - Empty the detection cache
//! - `GET /classes` - Class vocabulary
//! - `GET /health` - Health check endpoint
//! - `/customers`, `/vehicles`, `/service-orders`, `/parts` - Ledger CRUD
//! - `/reports/*` - Revenue and usage reports

pub mod handlers;
pub mod ledger_handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
