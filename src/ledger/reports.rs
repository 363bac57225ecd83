//! Reports: revenue and usage aggregates over the ledger tables.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::ledger::{Id, OrderStatus, OrderView, ServiceOrder, Tables};

/// How many rows ranking reports return.
pub const TOP_N: usize = 10;

/// Default look-back window for ranking reports.
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub revenue: f64,
    pub orders: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub total_revenue: f64,
    pub total_orders: usize,
    /// Keyed by day of month
    pub daily: BTreeMap<u32, DailyRevenue>,
    pub orders: Vec<OrderView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartRanking {
    pub name: String,
    pub total_quantity: u64,
    pub total_value: f64,
    pub total_uses: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopParts {
    pub period_days: i64,
    pub since: NaiveDate,
    pub parts: Vec<PartRanking>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRanking {
    pub name: String,
    pub count: usize,
    pub total_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopServices {
    pub period_days: i64,
    pub since: NaiveDate,
    pub total_orders: usize,
    pub services: Vec<ServiceRanking>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub active_customers: usize,
    pub active_vehicles: usize,
    pub orders_in_progress: usize,
    pub orders_ready: usize,
    pub orders_delivered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
    pub total_orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub overall: OverallStats,
    pub current_month: MonthSummary,
}

fn in_month(order: &ServiceOrder, year: i32, month: u32) -> bool {
    order.entry_date.year() == year && order.entry_date.month() == month
}

fn period_start(today: NaiveDate, days: i64) -> Result<NaiveDate> {
    u64::try_from(days)
        .ok()
        .and_then(|d| today.checked_sub_days(Days::new(d)))
        .ok_or_else(|| AppError::Validation("days must be a non-negative number".to_string()))
}

/// Revenue from delivered orders entered in `year`/`month`.
pub fn monthly_revenue(tables: &Tables, year: i32, month: u32) -> Result<MonthlyRevenue> {
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(
            "month must be between 1 and 12".to_string(),
        ));
    }

    let delivered: Vec<&ServiceOrder> = tables
        .orders
        .values()
        .filter(|o| o.status == OrderStatus::Delivered && in_month(o, year, month))
        .collect();

    let mut daily: BTreeMap<u32, DailyRevenue> = BTreeMap::new();
    for order in &delivered {
        let day = daily.entry(order.entry_date.day()).or_default();
        day.revenue += order.total;
        day.orders += 1;
    }

    Ok(MonthlyRevenue {
        year,
        month,
        total_revenue: delivered.iter().map(|o| o.total).sum(),
        total_orders: delivered.len(),
        daily,
        orders: delivered.iter().map(|o| tables.order_view(o)).collect(),
    })
}

/// Parts ranked by quantity used on orders entered in the last `days` days.
pub fn top_parts(tables: &Tables, today: NaiveDate, days: i64) -> Result<TopParts> {
    let since = period_start(today, days)?;

    let mut by_part: HashMap<Id, PartRanking> = HashMap::new();
    for usage in tables.usages.values() {
        let recent = tables
            .orders
            .get(usage.service_order_id)
            .is_some_and(|o| o.entry_date >= since);
        let Some(part) = tables.parts.get(usage.part_id) else {
            continue;
        };
        if !recent {
            continue;
        }

        let ranking = by_part.entry(part.id).or_insert_with(|| PartRanking {
            name: part.name.clone(),
            total_quantity: 0,
            total_value: 0.0,
            total_uses: 0,
        });
        ranking.total_quantity += usage.quantity as u64;
        ranking.total_value += usage.total_price;
        ranking.total_uses += 1;
    }

    let mut parts: Vec<PartRanking> = by_part.into_values().collect();
    parts.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.name.cmp(&b.name))
    });
    parts.truncate(TOP_N);

    Ok(TopParts {
        period_days: days,
        since,
        parts,
    })
}

/// Services ranked by how many delivered orders listed them.
///
/// The services text is split on `,` and `;`; names are matched
/// case-insensitively and reported with their first spelling.
pub fn top_services(tables: &Tables, today: NaiveDate, days: i64) -> Result<TopServices> {
    let since = period_start(today, days)?;

    let orders: Vec<&ServiceOrder> = tables
        .orders
        .values()
        .filter(|o| o.status == OrderStatus::Delivered && o.entry_date >= since)
        .collect();

    let mut by_service: HashMap<String, ServiceRanking> = HashMap::new();
    for order in &orders {
        let Some(services) = order.services.as_deref() else {
            continue;
        };
        for service in services.split([',', ';']).map(str::trim) {
            if service.is_empty() {
                continue;
            }
            let ranking = by_service
                .entry(service.to_lowercase())
                .or_insert_with(|| ServiceRanking {
                    name: service.to_string(),
                    count: 0,
                    total_value: 0.0,
                });
            ranking.count += 1;
            ranking.total_value += order.total;
        }
    }

    let mut services: Vec<ServiceRanking> = by_service.into_values().collect();
    services.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    services.truncate(TOP_N);

    Ok(TopServices {
        period_days: days,
        since,
        total_orders: orders.len(),
        services,
    })
}

/// Shop-wide counters plus the current month's delivered revenue.
pub fn dashboard(tables: &Tables, today: NaiveDate) -> Dashboard {
    let customers: HashSet<Id> = tables.orders.values().map(|o| o.customer_id).collect();
    let vehicles: HashSet<Id> = tables.orders.values().map(|o| o.vehicle_id).collect();
    let count_status = |status: OrderStatus| {
        tables
            .orders
            .values()
            .filter(|o| o.status == status)
            .count()
    };

    let (year, month) = (today.year(), today.month());
    let this_month: Vec<&ServiceOrder> = tables
        .orders
        .values()
        .filter(|o| in_month(o, year, month))
        .collect();

    Dashboard {
        overall: OverallStats {
            active_customers: customers.len(),
            active_vehicles: vehicles.len(),
            orders_in_progress: count_status(OrderStatus::InProgress),
            orders_ready: count_status(OrderStatus::Ready),
            orders_delivered: count_status(OrderStatus::Delivered),
        },
        current_month: MonthSummary {
            year,
            month,
            revenue: this_month
                .iter()
                .filter(|o| o.status == OrderStatus::Delivered)
                .map(|o| o.total)
                .sum(),
            total_orders: this_month.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Customer, Part, PartUsage, Vehicle};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Two customers, one vehicle each, and a handful of orders.
    fn fixture() -> Tables {
        let mut t = Tables::default();
        for name in ["Ana", "Bruno"] {
            t.customers.insert_with(|id| Customer {
                id,
                name: name.to_string(),
                phone: None,
                email: None,
            });
        }
        for (plate, customer_id) in [("AAA1111", 1), ("BBB2222", 2)] {
            t.vehicles.insert_with(|id| Vehicle {
                id,
                plate: plate.to_string(),
                model: None,
                year: None,
                mileage: None,
                customer_id,
            });
        }
        let orders = [
            (date(2024, 5, 3), OrderStatus::Delivered, 100.0, "Oil change, Alignment", 1),
            (date(2024, 5, 3), OrderStatus::Delivered, 50.0, "oil change; Brakes", 2),
            (date(2024, 5, 20), OrderStatus::Ready, 80.0, "Brakes", 1),
            (date(2024, 4, 28), OrderStatus::Delivered, 70.0, "Alignment", 2),
            (date(2024, 1, 2), OrderStatus::Delivered, 999.0, "Engine", 1),
        ];
        for (entry_date, status, total, services, customer_id) in orders {
            t.orders.insert_with(|id| ServiceOrder {
                id,
                entry_date,
                reported_defect: None,
                services: Some(services.to_string()),
                status,
                labor_cost: total,
                total,
                customer_id,
                vehicle_id: customer_id,
            });
        }
        for (name, unit_price) in [("Filter", 10.0), ("Pad", 30.0)] {
            t.parts.insert_with(|id| Part {
                id,
                name: name.to_string(),
                unit_price,
                stock: 100,
            });
        }
        // (order, part, quantity)
        for (order_id, part_id, quantity) in [(1, 1, 2), (2, 1, 1), (3, 2, 4), (5, 2, 9)] {
            let unit_price = t.parts.get(part_id).unwrap().unit_price;
            t.usages.insert_with(|id| PartUsage {
                id,
                quantity,
                total_price: unit_price * quantity as f64,
                service_order_id: order_id,
                part_id,
            });
        }
        t
    }

    #[test]
    fn test_monthly_revenue() {
        let report = monthly_revenue(&fixture(), 2024, 5).unwrap();

        assert_eq!(report.total_orders, 2);
        assert_eq!(report.total_revenue, 150.0);
        assert_eq!(report.daily.len(), 1);
        assert_eq!(
            report.daily[&3],
            DailyRevenue {
                revenue: 150.0,
                orders: 2
            }
        );
        assert_eq!(report.orders[0].customer_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_monthly_revenue_rejects_bad_month() {
        assert!(matches!(
            monthly_revenue(&fixture(), 2024, 13),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_top_parts_respects_period() {
        let report = top_parts(&fixture(), date(2024, 5, 31), 30).unwrap();

        assert_eq!(report.since, date(2024, 5, 1));
        assert_eq!(report.parts.len(), 2);
        assert_eq!(report.parts[0].name, "Pad");
        assert_eq!(report.parts[0].total_quantity, 4);
        assert_eq!(report.parts[0].total_value, 120.0);
        assert_eq!(report.parts[1].name, "Filter");
        assert_eq!(report.parts[1].total_quantity, 3);
        assert_eq!(report.parts[1].total_uses, 2);
    }

    #[test]
    fn test_top_parts_rejects_negative_days() {
        assert!(top_parts(&fixture(), date(2024, 5, 31), -1).is_err());
    }

    #[test]
    fn test_top_services_counts_case_insensitively() {
        let report = top_services(&fixture(), date(2024, 5, 31), 40).unwrap();

        assert_eq!(report.total_orders, 3);
        let oil = report
            .services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case("oil change"))
            .unwrap();
        assert_eq!(oil.count, 2);
        assert_eq!(oil.total_value, 150.0);

        let alignment = report
            .services
            .iter()
            .find(|s| s.name == "Alignment")
            .unwrap();
        assert_eq!(alignment.count, 2);
        assert!(report.services.iter().all(|s| s.name != "Engine"));
    }

    #[test]
    fn test_dashboard() {
        let dashboard = dashboard(&fixture(), date(2024, 5, 31));

        assert_eq!(dashboard.overall.active_customers, 2);
        assert_eq!(dashboard.overall.active_vehicles, 2);
        assert_eq!(dashboard.overall.orders_in_progress, 0);
        assert_eq!(dashboard.overall.orders_ready, 1);
        assert_eq!(dashboard.overall.orders_delivered, 4);
        assert_eq!(dashboard.current_month.revenue, 150.0);
        assert_eq!(dashboard.current_month.total_orders, 3);
    }
}
