//! Sales performance over a date window.

use serde::{Deserialize, Serialize};

use erpbridge_core::DateWindow;

use crate::aggregate::{
    distinct_records, rank_groups, trend, Bucket, GroupTotal, Observation, PeriodComparison, TrendPoint,
};
use crate::result::{AnalyticsError, AnalyticsResult, InputWindow};

/// How to break the window's revenue down.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesDimension {
    Product,
    Customer,
    Salesperson,
    Period(Bucket),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesTotals {
    pub revenue: f64,
    pub quantity: f64,
    pub orders: usize,
    /// Absent when there are no orders.
    pub average_order_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesPerformance {
    pub dimension: SalesDimension,
    pub totals: SalesTotals,
    pub previous_period: InputWindow,
    pub comparison: PeriodComparison,
    /// Top groups for product/customer/salesperson breakdowns.
    pub ranking: Vec<GroupTotal>,
    /// Chronological buckets for period breakdowns.
    pub trend: Vec<TrendPoint>,
}

fn totals(observations: &[Observation]) -> SalesTotals {
    let revenue: f64 = observations.iter().map(|o| o.amount).sum();
    let quantity: f64 = observations.iter().map(|o| o.quantity).sum();
    let orders = distinct_records(observations);
    SalesTotals {
        revenue,
        quantity,
        orders,
        average_order_value: (orders > 0).then(|| revenue / orders as f64),
    }
}

/// Rank `current` by `dimension` and compare it with `previous`.
///
/// `current` must fall inside `window`; `previous` inside `window.previous()`.
pub fn sales_performance(
    window: DateWindow,
    current: &[Observation],
    previous: &[Observation],
    dimension: SalesDimension,
    top_n: usize,
) -> Result<AnalyticsResult<SalesPerformance>, AnalyticsError> {
    if top_n == 0 {
        return Err(AnalyticsError::InvalidInput("top_n must be at least 1".into()));
    }
    if let Some(stray) = current.iter().find(|o| !window.contains(o.date)) {
        return Err(AnalyticsError::InvalidInput(format!(
            "record {} dated {} lies outside {}..{}",
            stray.record_id, stray.date, window.from, window.to
        )));
    }

    let current_totals = totals(current);
    let previous_totals = totals(previous);
    let (ranking, trend_points) = match dimension {
        SalesDimension::Period(bucket) => (Vec::new(), trend(current, bucket)),
        _ => (rank_groups(current, top_n), Vec::new()),
    };

    let metrics = SalesPerformance {
        dimension,
        comparison: PeriodComparison::new(current_totals.revenue, previous_totals.revenue),
        previous_period: InputWindow::new(window.previous(), previous_totals.orders),
        totals: current_totals,
        ranking,
        trend: trend_points,
    };
    Ok(AnalyticsResult::new(
        InputWindow::new(window, metrics.totals.orders),
        metrics,
    ))
}
