//! Shop ledger: customers, vehicles, service orders, parts and part usage
//!
//! All rows live in memory behind `Ledger`; a sled database can be attached
//! to keep them across restarts, one tree per table.

mod models;
mod persistence;
pub mod reports;
mod store;

pub use models::{
    Customer, CustomerDetail, Id, OrderDetail, OrderStatus, OrderView, Part, PartUsage,
    PartUsageView, Quote, ServiceOrder, Vehicle, VehicleView,
};
pub use persistence::LedgerPersistence;
pub use reports::{Dashboard, MonthlyRevenue, TopParts, TopServices};
pub use store::{Changes, Ledger, Table, TableChanges, Tables};
