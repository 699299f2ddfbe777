//! `erpbridge-analytics`
//!
//! Pure computations over record sets that were already fetched. Nothing in
//! this crate performs IO, so every metric can be checked against fixed inputs.
//!
//! Every output is an [`AnalyticsResult`] carrying the input window and record
//! count next to the figures.

pub mod aggregate;
pub mod inventory;
pub mod ratios;
pub mod result;
pub mod sales;
pub mod supplier;

pub use aggregate::{
    rank_groups, trend, Bucket, GroupKey, GroupTotal, Observation, PeriodComparison, TrendPoint, DEFAULT_TOP_N,
};
pub use inventory::{turnover, turnover_report, ProductValuation, Turnover, TurnoverReport, ValuationSnapshot};
pub use ratios::{financial_ratios, AccountClass, Balances, FinancialRatios, LedgerLine, RatioFamily};
pub use result::{AnalyticsError, AnalyticsResult, InputWindow, Ratio};
pub use sales::{sales_performance, SalesDimension, SalesPerformance};
pub use supplier::{supplier_performance, PurchaseObservation, SupplierPerformance};
