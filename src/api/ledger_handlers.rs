//! Ledger and report handlers
//!
//! Thin adapters from HTTP onto `Ledger`. Reads take the read lock. Every
//! mutation holds the write lock and runs on the blocking pool, where a
//! persistent ledger flushes its commit to disk.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Local, NaiveDate};

use super::handlers::{json_body, path_id, query, AppState};
use crate::error::{AppError, Result};
use crate::ledger::reports::{self, DEFAULT_PERIOD_DAYS};
use crate::ledger::{
    Customer, CustomerDetail, Dashboard, Id, Ledger, MonthlyRevenue, OrderDetail, OrderStatus, OrderView,
    Part, PartUsageView, Quote, TopParts, TopServices, VehicleView,
};
use crate::models::{
    CustomerRequest, MessageResponse, MonthlyRevenueQuery, OrderListQuery, PartRequest,
    PartUsageRequest, PeriodQuery, ServiceOrderRequest, StatusRequest, VehicleRequest,
};

type Body<T> = std::result::Result<Json<T>, JsonRejection>;
type IdPath = std::result::Result<Path<Id>, PathRejection>;
type Params<T> = std::result::Result<Query<T>, QueryRejection>;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn created<T>(value: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(value))
}

fn deleted(what: &str) -> Json<MessageResponse> {
    Json(MessageResponse::ok(format!("{} deleted", what)))
}

/// Runs `op` against the ledger on the blocking pool under the write lock.
async fn mutate<T, F>(state: &AppState, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Ledger) -> Result<T> + Send + 'static,
{
    let mut ledger = Arc::clone(&state.ledger).write_owned().await;
    tokio::task::spawn_blocking(move || op(&mut ledger))
        .await
        .map_err(|e| AppError::Internal(format!("Ledger task failed: {}", e)))?
}

// == Customers ==

pub async fn list_customers(State(state): State<AppState>) -> Json<Vec<Customer>> {
    let ledger = state.ledger.read().await;
    Json(ledger.list_customers())
}

pub async fn get_customer(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<CustomerDetail>> {
    let id = path_id(id)?;
    let ledger = state.ledger.read().await;
    ledger.get_customer(id).map(Json)
}

pub async fn create_customer(
    State(state): State<AppState>,
    body: Body<CustomerRequest>,
) -> Result<(StatusCode, Json<Customer>)> {
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.create_customer(req))
        .await
        .map(created)
}

pub async fn update_customer(
    State(state): State<AppState>,
    id: IdPath,
    body: Body<CustomerRequest>,
) -> Result<Json<Customer>> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.update_customer(id, req))
        .await
        .map(Json)
}

pub async fn delete_customer(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<MessageResponse>> {
    let id = path_id(id)?;
    mutate(&state, move |ledger| ledger.delete_customer(id))
        .await?;
    Ok(deleted("Customer"))
}

// == Vehicles ==

pub async fn list_vehicles(State(state): State<AppState>) -> Json<Vec<VehicleView>> {
    let ledger = state.ledger.read().await;
    Json(ledger.list_vehicles())
}

pub async fn get_vehicle(State(state): State<AppState>, id: IdPath) -> Result<Json<VehicleView>> {
    let id = path_id(id)?;
    let ledger = state.ledger.read().await;
    ledger.get_vehicle(id).map(Json)
}

pub async fn vehicles_for_customer(
    State(state): State<AppState>,
    customer_id: IdPath,
) -> Result<Json<Vec<VehicleView>>> {
    let customer_id = path_id(customer_id)?;
    let ledger = state.ledger.read().await;
    ledger.vehicles_for_customer(customer_id).map(Json)
}

pub async fn find_vehicle_by_plate(
    State(state): State<AppState>,
    Path(plate): Path<String>,
) -> Result<Json<VehicleView>> {
    let ledger = state.ledger.read().await;
    ledger.find_vehicle_by_plate(&plate).map(Json)
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    body: Body<VehicleRequest>,
) -> Result<(StatusCode, Json<VehicleView>)> {
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.create_vehicle(req))
        .await
        .map(created)
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    id: IdPath,
    body: Body<VehicleRequest>,
) -> Result<Json<VehicleView>> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.update_vehicle(id, req))
        .await
        .map(Json)
}

pub async fn delete_vehicle(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<MessageResponse>> {
    let id = path_id(id)?;
    mutate(&state, move |ledger| ledger.delete_vehicle(id))
        .await?;
    Ok(deleted("Vehicle"))
}

// == Service Orders ==

pub async fn list_orders(
    State(state): State<AppState>,
    params: Params<OrderListQuery>,
) -> Result<Json<Vec<OrderView>>> {
    let status = query(params)?
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()?;
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.list_orders(status)))
}

pub async fn get_order(State(state): State<AppState>, id: IdPath) -> Result<Json<OrderDetail>> {
    let id = path_id(id)?;
    let ledger = state.ledger.read().await;
    ledger.get_order(id).map(Json)
}

pub async fn create_order(
    State(state): State<AppState>,
    body: Body<ServiceOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let req = json_body(body)?;
    let today = today();
    mutate(&state, move |ledger| ledger.create_order(req, today))
        .await
        .map(created)
}

pub async fn update_order(
    State(state): State<AppState>,
    id: IdPath,
    body: Body<ServiceOrderRequest>,
) -> Result<Json<OrderView>> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.update_order(id, req))
        .await
        .map(Json)
}

pub async fn set_order_status(
    State(state): State<AppState>,
    id: IdPath,
    body: Body<StatusRequest>,
) -> Result<Json<OrderView>> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    mutate(&state, move |ledger| {
        ledger.set_order_status(id, req.status.as_deref())
    })
    .await
    .map(Json)
}

pub async fn delete_order(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<MessageResponse>> {
    let id = path_id(id)?;
    mutate(&state, move |ledger| ledger.delete_order(id))
        .await?;
    Ok(deleted("Service order"))
}

pub async fn quote_order(State(state): State<AppState>, id: IdPath) -> Result<Json<Quote>> {
    let id = path_id(id)?;
    mutate(&state, move |ledger| ledger.quote(id))
        .await
        .map(Json)
}

// == Part Usage ==

pub async fn list_part_usages(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<Vec<PartUsageView>>> {
    let id = path_id(id)?;
    let ledger = state.ledger.read().await;
    ledger.list_part_usages(id).map(Json)
}

pub async fn add_part_usage(
    State(state): State<AppState>,
    id: IdPath,
    body: Body<PartUsageRequest>,
) -> Result<(StatusCode, Json<PartUsageView>)> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.add_part_usage(id, req))
        .await
        .map(created)
}

pub async fn remove_part_usage(
    State(state): State<AppState>,
    ids: std::result::Result<Path<(Id, Id)>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let Path((order_id, usage_id)) =
        ids.map_err(|_| AppError::Validation("Invalid id".to_string()))?;
    mutate(&state, move |ledger| ledger.remove_part_usage(order_id, usage_id))
        .await?;
    Ok(Json(MessageResponse::ok("Part removed from service order")))
}

// == Parts ==

pub async fn list_parts(State(state): State<AppState>) -> Json<Vec<Part>> {
    let ledger = state.ledger.read().await;
    Json(ledger.list_parts())
}

pub async fn get_part(State(state): State<AppState>, id: IdPath) -> Result<Json<Part>> {
    let id = path_id(id)?;
    let ledger = state.ledger.read().await;
    ledger.get_part(id).map(Json)
}

pub async fn create_part(
    State(state): State<AppState>,
    body: Body<PartRequest>,
) -> Result<(StatusCode, Json<Part>)> {
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.create_part(req))
        .await
        .map(created)
}

pub async fn update_part(
    State(state): State<AppState>,
    id: IdPath,
    body: Body<PartRequest>,
) -> Result<Json<Part>> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    mutate(&state, move |ledger| ledger.update_part(id, req))
        .await
        .map(Json)
}

pub async fn delete_part(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<MessageResponse>> {
    let id = path_id(id)?;
    mutate(&state, move |ledger| ledger.delete_part(id))
        .await?;
    Ok(deleted("Part"))
}

// == Reports ==

pub async fn monthly_revenue(
    State(state): State<AppState>,
    params: Params<MonthlyRevenueQuery>,
) -> Result<Json<MonthlyRevenue>> {
    let params = query(params)?;
    let now = today();
    let year = params.year.unwrap_or(now.year());
    let month = params.month.unwrap_or(now.month());

    let ledger = state.ledger.read().await;
    reports::monthly_revenue(ledger.tables(), year, month).map(Json)
}

pub async fn top_parts(
    State(state): State<AppState>,
    params: Params<PeriodQuery>,
) -> Result<Json<TopParts>> {
    let days = query(params)?.days.unwrap_or(DEFAULT_PERIOD_DAYS);
    let ledger = state.ledger.read().await;
    reports::top_parts(ledger.tables(), today(), days).map(Json)
}

pub async fn top_services(
    State(state): State<AppState>,
    params: Params<PeriodQuery>,
) -> Result<Json<TopServices>> {
    let days = query(params)?.days.unwrap_or(DEFAULT_PERIOD_DAYS);
    let ledger = state.ledger.read().await;
    reports::top_services(ledger.tables(), today(), days).map(Json)
}

pub async fn dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    let ledger = state.ledger.read().await;
    Json(reports::dashboard(ledger.tables(), today()))
}
