//! Request DTOs for the shop API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.
//! Fields the ledger requires are still `Option` here so that a missing field
//! surfaces as a 400 with a readable message instead of a deserializer error.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::ledger::Id;

// == Detection ==

/// Request body for `POST /detect-realtime` and `POST /detect`
#[derive(Debug, Clone, Deserialize)]
pub struct DetectRequest {
    /// Base64 image, optionally as a data URL
    #[serde(default)]
    pub image: Option<String>,
    /// Minimum confidence in [0, 1]
    #[serde(default)]
    pub threshold: Option<f32>,
}

impl DetectRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match self.image.as_deref() {
            None => return Some("Field \"image\" is required".to_string()),
            Some(image) if image.trim().is_empty() => {
                return Some("Field \"image\" cannot be empty".to_string())
            }
            _ => {}
        }
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Some("Threshold must be between 0 and 1".to_string());
            }
        }
        None
    }
}

// == Customers ==

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// == Vehicles ==

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleRequest {
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub mileage: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<Id>,
}

// == Service Orders ==

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceOrderRequest {
    #[serde(default)]
    pub customer_id: Option<Id>,
    #[serde(default)]
    pub vehicle_id: Option<Id>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub entry_date: Option<String>,
    #[serde(default)]
    pub reported_defect: Option<String>,
    #[serde(default)]
    pub services: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub labor_cost: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

// == Parts ==

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartUsageRequest {
    #[serde(default)]
    pub part_id: Option<Id>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

// == Reports ==

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonthlyRevenueQuery {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
    /// Look-back window in days
    #[serde(default)]
    pub days: Option<i64>,
}

// == Field Helpers ==

/// Trimmed, non-empty text or a validation error naming `field`.
pub fn required_text(value: Option<&str>, field: &str) -> Result<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

/// Trimmed text, `None` when blank.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation("Invalid date format. Use YYYY-MM-DD".to_string())
    })
}

/// Finite, non-negative amount.
pub fn non_negative_amount(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AppError::Validation(format!(
            "{} must be a non-negative number",
            field
        )))
    }
}

/// Finite, strictly positive amount.
pub fn positive_amount(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AppError::Validation(format!(
            "{} must be greater than zero",
            field
        )))
    }
}

/// Count that fits the ledger's unsigned columns.
pub fn non_negative_count(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Validation(format!("{} must be a non-negative integer", field)))
}
