//! Request and Response models for the shop API
//!
//! This module defines the DTOs used for serializing/deserializing HTTP
//! request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{
    CustomerRequest, DetectRequest, MonthlyRevenueQuery, OrderListQuery, PartRequest,
    PartUsageRequest, PeriodQuery, ServiceOrderRequest, StatusRequest, VehicleRequest,
};
pub use responses::{
    ClassesResponse, DetectionResponse, ErrorResponse, HealthResponse, MessageResponse,
    PerformanceResponse,
};
