//! Ledger rows and the joined views returned by the API.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub type Id = u64;

// == Rows ==

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Id,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Id,
    /// Upper-cased, unique across vehicles
    pub plate: String,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub mileage: Option<u32>,
    pub customer_id: Id,
}

/// Where a service order is between intake and delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    InProgress,
    Ready,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::InProgress,
        OrderStatus::Ready,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();
                AppError::Validation(format!(
                    "Status must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: Id,
    pub entry_date: NaiveDate,
    pub reported_defect: Option<String>,
    pub services: Option<String>,
    pub status: OrderStatus,
    pub labor_cost: f64,
    /// Labor plus every part usage on the order
    pub total: f64,
    pub customer_id: Id,
    pub vehicle_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: Id,
    /// Unique across parts
    pub name: String,
    pub unit_price: f64,
    pub stock: u32,
}

/// A quantity of a part consumed by a service order, priced at use time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartUsage {
    pub id: Id,
    pub quantity: u32,
    pub total_price: f64,
    pub service_order_id: Id,
    pub part_id: Id,
}

// == Views ==

#[derive(Debug, Clone, Serialize)]
pub struct VehicleView {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub vehicles: Vec<VehicleView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: ServiceOrder,
    pub customer_name: Option<String>,
    pub vehicle_plate: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartUsageView {
    #[serde(flatten)]
    pub usage: PartUsage,
    pub part_name: Option<String>,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderView,
    pub part_usages: Vec<PartUsageView>,
}

/// Priced breakdown of a service order.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub service_order_id: Id,
    pub customer_name: Option<String>,
    pub vehicle_plate: Option<String>,
    pub entry_date: NaiveDate,
    pub services: Option<String>,
    pub labor_cost: f64,
    pub parts_total: f64,
    pub total: f64,
    pub part_usages: Vec<PartUsageView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("in_progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert_eq!("In Progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert_eq!("DELIVERED".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!(matches!(
            "lost".parse::<OrderStatus>(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_status_serialize() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(OrderStatus::Ready.to_string(), "ready");
    }

    #[test]
    fn test_view_flattens_row() {
        let view = VehicleView {
            vehicle: Vehicle {
                id: 1,
                plate: "ABC1234".to_string(),
                model: None,
                year: Some(2019),
                mileage: None,
                customer_id: 7,
            },
            customer_name: Some("Ana".to_string()),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["plate"], "ABC1234");
        assert_eq!(json["customer_id"], 7);
        assert_eq!(json["customer_name"], "Ana");
    }
}
