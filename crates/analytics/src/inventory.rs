//! Inventory turnover: cost of goods sold over average inventory value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use erpbridge_core::DateWindow;

use crate::aggregate::GroupKey;
use crate::result::{AnalyticsError, AnalyticsResult, InputWindow, Ratio, mean};

/// Inventory value at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turnover {
    pub cost_of_goods_sold: f64,
    pub average_inventory: f64,
    /// `cost_of_goods_sold / average_inventory`.
    pub turnover: Ratio,
    /// Period days divided by turnover; absent when nothing was sold.
    pub days_of_inventory: Option<f64>,
    pub snapshots: Vec<ValuationSnapshot>,
}

/// Turnover for one window.
///
/// Requires at least two valuation snapshots (start and end of the window);
/// fewer, or an average of zero, is [`AnalyticsError::InsufficientData`].
pub fn turnover(
    window: DateWindow,
    cost_of_goods_sold: f64,
    snapshots: &[ValuationSnapshot],
) -> Result<Turnover, AnalyticsError> {
    if snapshots.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "inventory turnover needs at least two valuation snapshots, got {}",
            snapshots.len()
        )));
    }
    if cost_of_goods_sold < 0.0 || !cost_of_goods_sold.is_finite() {
        return Err(AnalyticsError::InvalidInput(format!(
            "cost of goods sold must be a non-negative number, got {cost_of_goods_sold}"
        )));
    }

    let mut snapshots = snapshots.to_vec();
    snapshots.sort_by_key(|s| s.date);
    let values: Vec<f64> = snapshots.iter().map(|s| s.value).collect();
    let average_inventory = mean(&values).unwrap_or_default();

    let turnover = Ratio::compute(
        "inventory turnover",
        cost_of_goods_sold,
        average_inventory,
        "average inventory value",
    )?;
    let days_of_inventory = (turnover.value > 0.0).then(|| window.days() as f64 / turnover.value);

    Ok(Turnover {
        cost_of_goods_sold,
        average_inventory,
        turnover,
        days_of_inventory,
        snapshots,
    })
}

/// Per-product input to [`turnover_report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductValuation {
    pub product: GroupKey,
    pub cost_of_goods_sold: f64,
    pub snapshots: Vec<ValuationSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTurnover {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub turnover: Turnover,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedProduct {
    pub id: i64,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnoverReport {
    pub overall: Turnover,
    /// Fastest moving first.
    pub products: Vec<ProductTurnover>,
    pub excluded: Vec<ExcludedProduct>,
}

/// Overall turnover plus one row per product that has enough data.
///
/// Fails only when the overall figure cannot be computed; products without
/// enough snapshots are listed in `excluded` with the reason.
pub fn turnover_report(
    window: DateWindow,
    cost_of_goods_sold: f64,
    snapshots: &[ValuationSnapshot],
    products: &[ProductValuation],
    record_count: usize,
) -> Result<AnalyticsResult<TurnoverReport>, AnalyticsError> {
    let overall = turnover(window, cost_of_goods_sold, snapshots)?;

    let mut rows = Vec::new();
    let mut excluded = Vec::new();
    for p in products {
        match turnover(window, p.cost_of_goods_sold, &p.snapshots) {
            Ok(t) => rows.push(ProductTurnover {
                id: p.product.id,
                name: p.product.label.clone(),
                turnover: t,
            }),
            Err(AnalyticsError::InsufficientData(reason)) => excluded.push(ExcludedProduct {
                id: p.product.id,
                name: p.product.label.clone(),
                reason,
            }),
            Err(e) => return Err(e),
        }
    }
    rows.sort_by(|a, b| {
        b.turnover
            .turnover
            .value
            .total_cmp(&a.turnover.turnover.value)
            .then(a.id.cmp(&b.id))
    });

    Ok(AnalyticsResult::new(
        InputWindow::new(window, record_count),
        TurnoverReport { overall, products: rows, excluded },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> DateWindow {
        DateWindow::parse("2024-01-01", "2024-03-31").unwrap()
    }

    fn snap(date: &str, value: f64) -> ValuationSnapshot {
        ValuationSnapshot {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            value,
        }
    }

    #[test]
    fn fewer_than_two_snapshots_is_insufficient_data() {
        for snaps in [vec![], vec![snap("2024-01-01", 1000.0)]] {
            let err = turnover(window(), 500.0, &snaps).unwrap_err();
            assert!(matches!(err, AnalyticsError::InsufficientData(_)));
        }
    }

    #[test]
    fn zero_average_inventory_is_insufficient_data() {
        let snaps = [snap("2024-01-01", 0.0), snap("2024-03-31", 0.0)];
        assert!(matches!(
            turnover(window(), 500.0, &snaps),
            Err(AnalyticsError::InsufficientData(_))
        ));
    }

    #[test]
    fn turnover_discloses_numerator_and_denominator() {
        let snaps = [snap("2024-03-31", 3000.0), snap("2024-01-01", 1000.0)];
        let t = turnover(window(), 4000.0, &snaps).unwrap();
        assert_eq!(t.average_inventory, 2000.0);
        assert_eq!(t.turnover.value, 2.0);
        assert_eq!(t.turnover.numerator, 4000.0);
        assert_eq!(t.turnover.denominator, 2000.0);
        assert_eq!(t.days_of_inventory, Some(91.0 / 2.0));
        assert_eq!(t.snapshots[0].value, 1000.0);
    }

    #[test]
    fn nothing_sold_has_no_days_of_inventory() {
        let snaps = [snap("2024-01-01", 10.0), snap("2024-03-31", 10.0)];
        assert_eq!(turnover(window(), 0.0, &snaps).unwrap().days_of_inventory, None);
    }

    #[test]
    fn report_excludes_products_without_history() {
        let overall = [snap("2024-01-01", 1000.0), snap("2024-03-31", 1000.0)];
        let products = [
            ProductValuation {
                product: GroupKey::new(1, "Desk"),
                cost_of_goods_sold: 300.0,
                snapshots: vec![snap("2024-01-01", 100.0), snap("2024-03-31", 200.0)],
            },
            ProductValuation {
                product: GroupKey::new(2, "Chair"),
                cost_of_goods_sold: 100.0,
                snapshots: vec![snap("2024-03-31", 50.0)],
            },
        ];
        let report = turnover_report(window(), 400.0, &overall, &products, 12).unwrap();
        assert_eq!(report.window.record_count, 12);
        assert_eq!(report.metrics.products.len(), 1);
        assert_eq!(report.metrics.products[0].turnover.turnover.value, 2.0);
        assert_eq!(report.metrics.excluded[0].id, 2);
    }
}
