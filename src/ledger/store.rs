//! Ledger Store
//!
//! Row storage for the shop tables and every create/read/update/delete
//! operation over them. Mutations run inside `Ledger::transaction`, which
//! restores the previous tables when any step (including persistence) fails.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::ledger::{
    Customer, CustomerDetail, Id, LedgerPersistence, OrderDetail, OrderStatus, OrderView, Part,
    PartUsage, PartUsageView, Quote, ServiceOrder, Vehicle, VehicleView,
};
use crate::models::requests::{
    non_negative_amount, non_negative_count, optional_text, parse_date, positive_amount,
    required_text, CustomerRequest, PartRequest, PartUsageRequest, ServiceOrderRequest,
    VehicleRequest,
};

// == Table ==
/// Rows keyed by id with a monotonically increasing id sequence.
///
/// Every row touched through `insert_with`, `get_mut` or `remove` is
/// journaled with its prior value until the table is committed or rolled
/// back, so a transaction only has to persist or undo those rows.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: BTreeMap<Id, T>,
    last_id: Id,
    journal: Journal<T>,
}

#[derive(Debug, Clone)]
struct Journal<T> {
    /// Row values before their first change; `None` for rows created since
    before: BTreeMap<Id, Option<T>>,
    last_id: Option<Id>,
}

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self {
            before: BTreeMap::new(),
            last_id: None,
        }
    }
}

/// Rows changed since the last commit, with their current values.
/// A `None` value means the row was removed.
#[derive(Debug)]
pub struct TableChanges<'a, T> {
    pub last_id: Id,
    pub rows: Vec<(Id, Option<&'a T>)>,
}

impl<T> TableChanges<'_, T> {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
            journal: Journal::default(),
        }
    }
}

impl<T: Clone> Table<T> {
    /// Rebuilds a table from stored rows. The id sequence never falls
    /// behind the largest stored id.
    pub fn from_rows(rows: BTreeMap<Id, T>, last_id: Id) -> Self {
        let max_id = rows.keys().next_back().copied().unwrap_or(0);
        Self {
            rows,
            last_id: last_id.max(max_id),
            journal: Journal::default(),
        }
    }

    /// Allocates the next id and stores the row built from it.
    pub fn insert_with(&mut self, build: impl FnOnce(Id) -> T) -> &T {
        self.journal.last_id.get_or_insert(self.last_id);
        self.last_id += 1;
        let id = self.last_id;
        self.record(id);
        self.rows.entry(id).or_insert(build(id))
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        if self.rows.contains_key(&id) {
            self.record(id);
        }
        self.rows.get_mut(&id)
    }

    pub fn remove(&mut self, id: Id) -> Option<T> {
        if self.rows.contains_key(&id) {
            self.record(id);
        }
        self.rows.remove(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.rows.contains_key(&id)
    }

    /// Rows in id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_id(&self) -> Id {
        self.last_id
    }

    fn record(&mut self, id: Id) {
        if let Entry::Vacant(slot) = self.journal.before.entry(id) {
            slot.insert(self.rows.get(&id).cloned());
        }
    }

    pub fn changes(&self) -> TableChanges<'_, T> {
        TableChanges {
            last_id: self.last_id,
            rows: self
                .journal
                .before
                .keys()
                .map(|id| (*id, self.rows.get(id)))
                .collect(),
        }
    }

    fn commit(&mut self) {
        self.journal = Journal::default();
    }

    fn rollback(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        for (id, before) in journal.before {
            match before {
                Some(row) => {
                    self.rows.insert(id, row);
                }
                None => {
                    self.rows.remove(&id);
                }
            }
        }
        if let Some(last_id) = journal.last_id {
            self.last_id = last_id;
        }
    }
}

// == Tables ==
/// Every ledger table.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub customers: Table<Customer>,
    pub vehicles: Table<Vehicle>,
    pub orders: Table<ServiceOrder>,
    pub parts: Table<Part>,
    pub usages: Table<PartUsage>,
}

/// Uncommitted row changes across every table.
#[derive(Debug)]
pub struct Changes<'a> {
    pub customers: TableChanges<'a, Customer>,
    pub vehicles: TableChanges<'a, Vehicle>,
    pub orders: TableChanges<'a, ServiceOrder>,
    pub parts: TableChanges<'a, Part>,
    pub usages: TableChanges<'a, PartUsage>,
}

impl Changes<'_> {
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
            && self.vehicles.is_empty()
            && self.orders.is_empty()
            && self.parts.is_empty()
            && self.usages.is_empty()
    }
}

impl Tables {
    pub fn changes(&self) -> Changes<'_> {
        Changes {
            customers: self.customers.changes(),
            vehicles: self.vehicles.changes(),
            orders: self.orders.changes(),
            parts: self.parts.changes(),
            usages: self.usages.changes(),
        }
    }

    fn commit(&mut self) {
        self.customers.commit();
        self.vehicles.commit();
        self.orders.commit();
        self.parts.commit();
        self.usages.commit();
    }

    fn rollback(&mut self) {
        self.customers.rollback();
        self.vehicles.rollback();
        self.orders.rollback();
        self.parts.rollback();
        self.usages.rollback();
    }

    fn customer(&self, id: Id) -> Result<&Customer> {
        self.customers
            .get(id)
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))
    }

    fn vehicle(&self, id: Id) -> Result<&Vehicle> {
        self.vehicles
            .get(id)
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))
    }

    fn order(&self, id: Id) -> Result<&ServiceOrder> {
        self.orders
            .get(id)
            .ok_or_else(|| AppError::NotFound("Service order not found".to_string()))
    }

    fn part(&self, id: Id) -> Result<&Part> {
        self.parts
            .get(id)
            .ok_or_else(|| AppError::NotFound("Part not found".to_string()))
    }

    fn usage(&self, id: Id) -> Result<&PartUsage> {
        self.usages
            .get(id)
            .ok_or_else(|| AppError::NotFound("Part usage not found".to_string()))
    }

    fn order_mut(&mut self, id: Id) -> Result<&mut ServiceOrder> {
        self.orders
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("Service order not found".to_string()))
    }

    fn part_mut(&mut self, id: Id) -> Result<&mut Part> {
        self.parts
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("Part not found".to_string()))
    }

    fn plate_taken(&self, plate: &str, except: Option<Id>) -> bool {
        self.vehicles
            .values()
            .any(|v| v.plate == plate && Some(v.id) != except)
    }

    fn part_name_taken(&self, name: &str, except: Option<Id>) -> bool {
        self.parts
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }

    pub fn usages_of(&self, order_id: Id) -> impl Iterator<Item = &PartUsage> {
        self.usages
            .values()
            .filter(move |u| u.service_order_id == order_id)
    }

    /// Sum of the usage totals recorded on an order.
    pub fn parts_total(&self, order_id: Id) -> f64 {
        self.usages_of(order_id).map(|u| u.total_price).sum()
    }

    /// Sets `total = labor_cost + parts_total` on the order.
    ///
    /// Fails when the sum leaves the finite range of `f64`.
    fn recompute_total(&mut self, order_id: Id) -> Result<f64> {
        let parts_total = self.parts_total(order_id);
        let order = self.order_mut(order_id)?;
        let total = order.labor_cost + parts_total;
        if !total.is_finite() {
            return Err(AppError::Validation("Order total is too large".to_string()));
        }
        order.total = total;
        Ok(total)
    }

    // == Views ==

    pub fn vehicle_view(&self, vehicle: &Vehicle) -> VehicleView {
        VehicleView {
            vehicle: vehicle.clone(),
            customer_name: self
                .customers
                .get(vehicle.customer_id)
                .map(|c| c.name.clone()),
        }
    }

    pub fn order_view(&self, order: &ServiceOrder) -> OrderView {
        OrderView {
            order: order.clone(),
            customer_name: self.customers.get(order.customer_id).map(|c| c.name.clone()),
            vehicle_plate: self.vehicles.get(order.vehicle_id).map(|v| v.plate.clone()),
        }
    }

    pub fn usage_view(&self, usage: &PartUsage) -> PartUsageView {
        let part = self.parts.get(usage.part_id);
        PartUsageView {
            usage: usage.clone(),
            part_name: part.map(|p| p.name.clone()),
            unit_price: part.map(|p| p.unit_price),
        }
    }

    fn usage_views(&self, order_id: Id) -> Vec<PartUsageView> {
        self.usages_of(order_id)
            .map(|u| self.usage_view(u))
            .collect()
    }
}

fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

fn parse_status(value: Option<&str>) -> Result<Option<OrderStatus>> {
    value.map(str::parse).transpose()
}

// == Ledger ==
/// The shop ledger with optional durable storage.
pub struct Ledger {
    tables: Tables,
    persistence: Option<LedgerPersistence>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    // == Constructors ==
    /// Creates an empty, memory-only ledger.
    pub fn new() -> Self {
        Self {
            tables: Tables::default(),
            persistence: None,
        }
    }

    /// Creates a ledger backed by `persistence`, loading any stored rows.
    pub fn with_persistence(persistence: LedgerPersistence) -> Result<Self> {
        let tables = persistence.load()?;
        debug!(
            "Ledger loaded: {} customers, {} vehicles, {} orders, {} parts",
            tables.customers.len(),
            tables.vehicles.len(),
            tables.orders.len(),
            tables.parts.len()
        );
        Ok(Self {
            tables,
            persistence: Some(persistence),
        })
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    // == Transaction ==
    /// Runs `op` against the tables and persists the rows it touched.
    ///
    /// If `op` or the persistence write fails, the touched rows are restored
    /// to their state before the call.
    fn transaction<T>(&mut self, op: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let outcome = op(&mut self.tables).and_then(|value| {
            if let Some(persistence) = &self.persistence {
                persistence.commit(&self.tables.changes())?;
            }
            Ok(value)
        });

        match &outcome {
            Ok(_) => self.tables.commit(),
            Err(err) => {
                self.tables.rollback();
                warn!("Ledger transaction rolled back: {}", err);
            }
        }
        outcome
    }

    // == Customers ==

    pub fn list_customers(&self) -> Vec<Customer> {
        self.tables.customers.values().cloned().collect()
    }

    /// Customer with their vehicles.
    pub fn get_customer(&self, id: Id) -> Result<CustomerDetail> {
        let customer = self.tables.customer(id)?.clone();
        let vehicles = self
            .tables
            .vehicles
            .values()
            .filter(|v| v.customer_id == id)
            .map(|v| self.tables.vehicle_view(v))
            .collect();
        Ok(CustomerDetail { customer, vehicles })
    }

    pub fn create_customer(&mut self, req: CustomerRequest) -> Result<Customer> {
        let name = required_text(req.name.as_deref(), "Name")?;
        self.transaction(|t| {
            Ok(t.customers
                .insert_with(|id| Customer {
                    id,
                    name,
                    phone: optional_text(req.phone.as_deref()),
                    email: optional_text(req.email.as_deref()),
                })
                .clone())
        })
    }

    pub fn update_customer(&mut self, id: Id, req: CustomerRequest) -> Result<Customer> {
        let name = match req.name.as_deref() {
            Some(name) => Some(required_text(Some(name), "Name")?),
            None => None,
        };
        self.transaction(|t| {
            let customer = t
                .customers
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;
            if let Some(name) = name {
                customer.name = name;
            }
            if let Some(phone) = req.phone.as_deref() {
                customer.phone = optional_text(Some(phone));
            }
            if let Some(email) = req.email.as_deref() {
                customer.email = optional_text(Some(email));
            }
            Ok(customer.clone())
        })
    }

    pub fn delete_customer(&mut self, id: Id) -> Result<()> {
        self.transaction(|t| {
            t.customer(id)?;
            let has_vehicles = t.vehicles.values().any(|v| v.customer_id == id);
            let has_orders = t.orders.values().any(|o| o.customer_id == id);
            if has_vehicles || has_orders {
                return Err(AppError::Conflict(
                    "Cannot delete a customer with vehicles or service orders".to_string(),
                ));
            }
            t.customers.remove(id);
            Ok(())
        })
    }

    // == Vehicles ==

    pub fn list_vehicles(&self) -> Vec<VehicleView> {
        self.tables
            .vehicles
            .values()
            .map(|v| self.tables.vehicle_view(v))
            .collect()
    }

    pub fn get_vehicle(&self, id: Id) -> Result<VehicleView> {
        let vehicle = self.tables.vehicle(id)?;
        Ok(self.tables.vehicle_view(vehicle))
    }

    pub fn vehicles_for_customer(&self, customer_id: Id) -> Result<Vec<VehicleView>> {
        self.tables.customer(customer_id)?;
        Ok(self
            .tables
            .vehicles
            .values()
            .filter(|v| v.customer_id == customer_id)
            .map(|v| self.tables.vehicle_view(v))
            .collect())
    }

    /// Case-insensitive plate lookup.
    pub fn find_vehicle_by_plate(&self, plate: &str) -> Result<VehicleView> {
        let plate = normalize_plate(plate);
        self.tables
            .vehicles
            .values()
            .find(|v| v.plate == plate)
            .map(|v| self.tables.vehicle_view(v))
            .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))
    }

    pub fn create_vehicle(&mut self, req: VehicleRequest) -> Result<VehicleView> {
        let plate = normalize_plate(&required_text(req.plate.as_deref(), "Plate")?);
        let customer_id = req
            .customer_id
            .ok_or_else(|| AppError::Validation("customer_id is required".to_string()))?;
        let mileage = req
            .mileage
            .map(|m| non_negative_count(m, "Mileage"))
            .transpose()?;

        self.transaction(|t| {
            t.customer(customer_id)?;
            if t.plate_taken(&plate, None) {
                return Err(AppError::Conflict("Plate already registered".to_string()));
            }
            let vehicle = t
                .vehicles
                .insert_with(|id| Vehicle {
                    id,
                    plate,
                    model: optional_text(req.model.as_deref()),
                    year: req.year,
                    mileage,
                    customer_id,
                })
                .clone();
            Ok(t.vehicle_view(&vehicle))
        })
    }

    pub fn update_vehicle(&mut self, id: Id, req: VehicleRequest) -> Result<VehicleView> {
        let plate = match req.plate.as_deref() {
            Some(plate) => Some(normalize_plate(&required_text(Some(plate), "Plate")?)),
            None => None,
        };
        let mileage = req
            .mileage
            .map(|m| non_negative_count(m, "Mileage"))
            .transpose()?;

        self.transaction(|t| {
            t.vehicle(id)?;
            if let Some(plate) = &plate {
                if t.plate_taken(plate, Some(id)) {
                    return Err(AppError::Conflict("Plate already registered".to_string()));
                }
            }
            if let Some(customer_id) = req.customer_id {
                t.customer(customer_id)?;
            }

            let vehicle = t
                .vehicles
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))?;
            if let Some(plate) = plate {
                vehicle.plate = plate;
            }
            if let Some(model) = req.model.as_deref() {
                vehicle.model = optional_text(Some(model));
            }
            if req.year.is_some() {
                vehicle.year = req.year;
            }
            if mileage.is_some() {
                vehicle.mileage = mileage;
            }
            if let Some(customer_id) = req.customer_id {
                vehicle.customer_id = customer_id;
            }

            let vehicle = vehicle.clone();
            Ok(t.vehicle_view(&vehicle))
        })
    }

    pub fn delete_vehicle(&mut self, id: Id) -> Result<()> {
        self.transaction(|t| {
            t.vehicle(id)?;
            if t.orders.values().any(|o| o.vehicle_id == id) {
                return Err(AppError::Conflict(
                    "Cannot delete a vehicle with service orders".to_string(),
                ));
            }
            t.vehicles.remove(id);
            Ok(())
        })
    }

    // == Service Orders ==

    pub fn list_orders(&self, status: Option<OrderStatus>) -> Vec<OrderView> {
        self.tables
            .orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .map(|o| self.tables.order_view(o))
            .collect()
    }

    /// Order with its part usages.
    pub fn get_order(&self, id: Id) -> Result<OrderDetail> {
        let order = self.tables.order(id)?;
        Ok(OrderDetail {
            order: self.tables.order_view(order),
            part_usages: self.tables.usage_views(id),
        })
    }

    /// Opens a service order. `today` is the entry date when none is given.
    pub fn create_order(&mut self, req: ServiceOrderRequest, today: NaiveDate) -> Result<OrderView> {
        let (customer_id, vehicle_id) = match (req.customer_id, req.vehicle_id) {
            (Some(c), Some(v)) => (c, v),
            _ => {
                return Err(AppError::Validation(
                    "customer_id and vehicle_id are required".to_string(),
                ))
            }
        };
        let entry_date = match req.entry_date.as_deref() {
            Some(date) => parse_date(date)?,
            None => today,
        };
        let status = parse_status(req.status.as_deref())?.unwrap_or_default();
        let labor_cost = non_negative_amount(req.labor_cost.unwrap_or(0.0), "Labor cost")?;

        self.transaction(|t| {
            t.customer(customer_id)?;
            let vehicle = t.vehicle(vehicle_id)?;
            if vehicle.customer_id != customer_id {
                return Err(AppError::Validation(
                    "Vehicle does not belong to the given customer".to_string(),
                ));
            }

            let order = t
                .orders
                .insert_with(|id| ServiceOrder {
                    id,
                    entry_date,
                    reported_defect: optional_text(req.reported_defect.as_deref()),
                    services: optional_text(req.services.as_deref()),
                    status,
                    labor_cost,
                    total: labor_cost,
                    customer_id,
                    vehicle_id,
                })
                .clone();
            Ok(t.order_view(&order))
        })
    }

    /// Partial update; a new labor cost recomputes the order total.
    pub fn update_order(&mut self, id: Id, req: ServiceOrderRequest) -> Result<OrderView> {
        let entry_date = req.entry_date.as_deref().map(parse_date).transpose()?;
        let status = parse_status(req.status.as_deref())?;
        let labor_cost = req
            .labor_cost
            .map(|v| non_negative_amount(v, "Labor cost"))
            .transpose()?;

        self.transaction(|t| {
            let order = t.order_mut(id)?;
            if let Some(entry_date) = entry_date {
                order.entry_date = entry_date;
            }
            if let Some(defect) = req.reported_defect.as_deref() {
                order.reported_defect = optional_text(Some(defect));
            }
            if let Some(services) = req.services.as_deref() {
                order.services = optional_text(Some(services));
            }
            if let Some(status) = status {
                order.status = status;
            }
            if let Some(labor_cost) = labor_cost {
                order.labor_cost = labor_cost;
                t.recompute_total(id)?;
            }

            let order = t.order(id)?.clone();
            Ok(t.order_view(&order))
        })
    }

    pub fn set_order_status(&mut self, id: Id, status: Option<&str>) -> Result<OrderView> {
        let status = parse_status(status)?
            .ok_or_else(|| AppError::Validation("Status is required".to_string()))?;

        self.transaction(|t| {
            let order = t.order_mut(id)?;
            order.status = status;
            let order = order.clone();
            Ok(t.order_view(&order))
        })
    }

    /// Deletes an order and its part usages. Consumed stock is not returned.
    pub fn delete_order(&mut self, id: Id) -> Result<()> {
        self.transaction(|t| {
            t.order(id)?;
            let usage_ids: Vec<Id> = t.usages_of(id).map(|u| u.id).collect();
            for usage_id in usage_ids {
                t.usages.remove(usage_id);
            }
            t.orders.remove(id);
            Ok(())
        })
    }

    /// Recomputes and stores the order total, returning the priced breakdown.
    pub fn quote(&mut self, id: Id) -> Result<Quote> {
        self.transaction(|t| {
            let total = t.recompute_total(id)?;
            let order = t.order(id)?.clone();
            let view = t.order_view(&order);
            Ok(Quote {
                service_order_id: order.id,
                customer_name: view.customer_name,
                vehicle_plate: view.vehicle_plate,
                entry_date: order.entry_date,
                services: order.services,
                labor_cost: order.labor_cost,
                parts_total: t.parts_total(id),
                total,
                part_usages: t.usage_views(id),
            })
        })
    }

    // == Parts ==

    pub fn list_parts(&self) -> Vec<Part> {
        self.tables.parts.values().cloned().collect()
    }

    pub fn get_part(&self, id: Id) -> Result<Part> {
        self.tables.part(id).cloned()
    }

    pub fn create_part(&mut self, req: PartRequest) -> Result<Part> {
        let name = required_text(req.name.as_deref(), "Name")?;
        let unit_price = req
            .unit_price
            .ok_or_else(|| AppError::Validation("Unit price is required".to_string()))
            .and_then(|p| positive_amount(p, "Unit price"))?;
        let stock = non_negative_count(req.stock.unwrap_or(0), "Stock")?;

        self.transaction(|t| {
            if t.part_name_taken(&name, None) {
                return Err(AppError::Conflict("Part already registered".to_string()));
            }
            Ok(t.parts
                .insert_with(|id| Part {
                    id,
                    name,
                    unit_price,
                    stock,
                })
                .clone())
        })
    }

    pub fn update_part(&mut self, id: Id, req: PartRequest) -> Result<Part> {
        let name = match req.name.as_deref() {
            Some(name) => Some(required_text(Some(name), "Name")?),
            None => None,
        };
        let unit_price = req
            .unit_price
            .map(|p| positive_amount(p, "Unit price"))
            .transpose()?;
        let stock = req
            .stock
            .map(|s| non_negative_count(s, "Stock"))
            .transpose()?;

        self.transaction(|t| {
            t.part(id)?;
            if let Some(name) = &name {
                if t.part_name_taken(name, Some(id)) {
                    return Err(AppError::Conflict("Part name already exists".to_string()));
                }
            }

            let part = t.part_mut(id)?;
            if let Some(name) = name {
                part.name = name;
            }
            if let Some(unit_price) = unit_price {
                part.unit_price = unit_price;
            }
            if let Some(stock) = stock {
                part.stock = stock;
            }
            Ok(part.clone())
        })
    }

    pub fn delete_part(&mut self, id: Id) -> Result<()> {
        self.transaction(|t| {
            t.part(id)?;
            if t.usages.values().any(|u| u.part_id == id) {
                return Err(AppError::Conflict(
                    "Cannot delete a part already used on service orders".to_string(),
                ));
            }
            t.parts.remove(id);
            Ok(())
        })
    }

    // == Part Usage ==

    /// Consumes `quantity` of a part on an order.
    ///
    /// Stock drops by the quantity and the order total grows by
    /// `quantity * unit_price`.
    pub fn add_part_usage(&mut self, order_id: Id, req: PartUsageRequest) -> Result<PartUsageView> {
        self.transaction(|t| {
            t.order(order_id)?;
            let (part_id, quantity) = match (req.part_id, req.quantity) {
                (Some(p), Some(q)) => (p, q),
                _ => {
                    return Err(AppError::Validation(
                        "part_id and quantity are required".to_string(),
                    ))
                }
            };
            let quantity = match u32::try_from(quantity) {
                Ok(q) if q > 0 => q,
                _ => {
                    return Err(AppError::Validation(
                        "Quantity must be a positive integer".to_string(),
                    ))
                }
            };

            let part = t.part_mut(part_id)?;
            if part.stock < quantity {
                return Err(AppError::Validation(format!(
                    "Insufficient stock. Available: {}",
                    part.stock
                )));
            }
            let total_price = part.unit_price * quantity as f64;
            if !total_price.is_finite() {
                return Err(AppError::Validation("Part usage total is too large".to_string()));
            }
            part.stock -= quantity;

            let usage = t
                .usages
                .insert_with(|id| PartUsage {
                    id,
                    quantity,
                    total_price,
                    service_order_id: order_id,
                    part_id,
                })
                .clone();
            t.recompute_total(order_id)?;
            Ok(t.usage_view(&usage))
        })
    }

    /// Returns a usage's quantity to stock and takes its price off the order.
    pub fn remove_part_usage(&mut self, order_id: Id, usage_id: Id) -> Result<()> {
        self.transaction(|t| {
            t.order(order_id)?;
            let usage = t.usage(usage_id)?.clone();
            if usage.service_order_id != order_id {
                return Err(AppError::Validation(
                    "Part usage does not belong to this service order".to_string(),
                ));
            }

            if let Some(part) = t.parts.get_mut(usage.part_id) {
                part.stock = part.stock.checked_add(usage.quantity).ok_or_else(|| {
                    AppError::Conflict(format!(
                        "Returning {} units would overflow the stock of {}",
                        usage.quantity, part.name
                    ))
                })?;
            }
            t.usages.remove(usage_id);
            t.recompute_total(order_id)?;
            Ok(())
        })
    }

    pub fn list_part_usages(&self, order_id: Id) -> Result<Vec<PartUsageView>> {
        self.tables.order(order_id)?;
        Ok(self.tables.usage_views(order_id))
    }
}
