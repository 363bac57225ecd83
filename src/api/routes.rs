//! API Routes
//!
//! Configures the Axum router with the detection and ledger endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    classes_handler, clear_cache_handler, detect_handler, detect_realtime_handler,
    health_handler, performance_handler, AppState,
};
use super::ledger_handlers as ledger;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs every request
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Detection
        .route("/detect-realtime", post(detect_realtime_handler))
        .route("/detect", post(detect_handler))
        .route("/performance", get(performance_handler))
        .route("/clear-cache", post(clear_cache_handler))
        .route("/classes", get(classes_handler))
        .route("/health", get(health_handler))
        // Customers
        .route(
            "/customers",
            get(ledger::list_customers).post(ledger::create_customer),
        )
        .route(
            "/customers/:id",
            get(ledger::get_customer)
                .put(ledger::update_customer)
                .delete(ledger::delete_customer),
        )
        // Vehicles
        .route(
            "/vehicles",
            get(ledger::list_vehicles).post(ledger::create_vehicle),
        )
        .route(
            "/vehicles/:id",
            get(ledger::get_vehicle)
                .put(ledger::update_vehicle)
                .delete(ledger::delete_vehicle),
        )
        .route(
            "/vehicles/customer/:customer_id",
            get(ledger::vehicles_for_customer),
        )
        .route("/vehicles/plate/:plate", get(ledger::find_vehicle_by_plate))
        // Service orders
        .route(
            "/service-orders",
            get(ledger::list_orders).post(ledger::create_order),
        )
        .route(
            "/service-orders/:id",
            get(ledger::get_order)
                .put(ledger::update_order)
                .delete(ledger::delete_order),
        )
        .route(
            "/service-orders/:id/status",
            axum::routing::put(ledger::set_order_status),
        )
        .route("/service-orders/:id/quote", get(ledger::quote_order))
        .route(
            "/service-orders/:id/parts",
            get(ledger::list_part_usages).post(ledger::add_part_usage),
        )
        .route(
            "/service-orders/:id/parts/:usage_id",
            delete(ledger::remove_part_usage),
        )
        // Parts
        .route("/parts", get(ledger::list_parts).post(ledger::create_part))
        .route(
            "/parts/:id",
            get(ledger::get_part)
                .put(ledger::update_part)
                .delete(ledger::delete_part),
        )
        // Reports
        .route("/reports/monthly-revenue", get(ledger::monthly_revenue))
        .route("/reports/top-parts", get(ledger::top_parts))
        .route("/reports/top-services", get(ledger::top_services))
        .route("/reports/dashboard", get(ledger::dashboard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
