//! Supplier spend and delivery punctuality.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use erpbridge_core::DateWindow;

use crate::aggregate::GroupKey;
use crate::result::{AnalyticsError, AnalyticsResult, InputWindow, mean};

/// A purchase order reduced to spend and delivery dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseObservation {
    pub order_id: i64,
    pub supplier: GroupKey,
    pub order_date: NaiveDate,
    pub amount: f64,
    /// Promised receipt date.
    pub planned: Option<NaiveDate>,
    /// Actual receipt date; `None` while nothing was received.
    pub received: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRow {
    pub id: i64,
    pub name: String,
    pub orders: usize,
    pub amount: f64,
    /// Orders with both a planned and an actual receipt date.
    pub delivered: usize,
    pub on_time: usize,
    pub late: usize,
    pub on_time_rate: Option<f64>,
    /// Mean lateness in days over late deliveries.
    pub average_delay_days: Option<f64>,
    pub last_order: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPerformance {
    pub total_amount: f64,
    pub suppliers: Vec<SupplierRow>,
}

#[derive(Default)]
struct Acc {
    name: String,
    orders: usize,
    amount: f64,
    on_time: usize,
    delays: Vec<f64>,
    last_order: Option<NaiveDate>,
}

/// Per-supplier spend and punctuality, ranked by spend.
pub fn supplier_performance(
    window: DateWindow,
    orders: &[PurchaseObservation],
    top_n: usize,
) -> Result<AnalyticsResult<SupplierPerformance>, AnalyticsError> {
    if top_n == 0 {
        return Err(AnalyticsError::InvalidInput("top_n must be at least 1".into()));
    }

    let mut by_supplier: BTreeMap<i64, Acc> = BTreeMap::new();
    for order in orders {
        let acc = by_supplier.entry(order.supplier.id).or_default();
        if acc.name.is_empty() {
            acc.name = order.supplier.label.clone();
        }
        acc.orders += 1;
        acc.amount += order.amount;
        acc.last_order = acc.last_order.max(Some(order.order_date));
        if let (Some(planned), Some(received)) = (order.planned, order.received) {
            let delay = (received - planned).num_days();
            if delay <= 0 {
                acc.on_time += 1;
            } else {
                acc.delays.push(delay as f64);
            }
        }
    }

    let mut suppliers: Vec<SupplierRow> = by_supplier
        .into_iter()
        .map(|(id, acc)| {
            let late = acc.delays.len();
            let delivered = acc.on_time + late;
            SupplierRow {
                id,
                name: acc.name,
                orders: acc.orders,
                amount: acc.amount,
                delivered,
                on_time: acc.on_time,
                late,
                on_time_rate: (delivered > 0).then(|| acc.on_time as f64 / delivered as f64),
                average_delay_days: mean(&acc.delays),
                last_order: acc.last_order,
            }
        })
        .collect();
    suppliers.sort_by(|a, b| b.amount.total_cmp(&a.amount).then(a.id.cmp(&b.id)));
    suppliers.truncate(top_n);

    Ok(AnalyticsResult::new(
        InputWindow::new(window, orders.len()),
        SupplierPerformance {
            total_amount: orders.iter().map(|o| o.amount).sum(),
            suppliers,
        },
    ))
}
