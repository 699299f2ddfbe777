//! Grouping, ranking and bucketing of monetary observations.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::result::AnalyticsError;

pub const DEFAULT_TOP_N: usize = 10;

/// The entity an observation is attributed to (a product, customer, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub id: i64,
    pub label: String,
}

impl GroupKey {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self { id, label: label.into() }
    }

    /// Placeholder for records without the grouping field set.
    pub fn unassigned() -> Self {
        Self::new(0, "Unassigned")
    }
}

/// One fetched record reduced to what the aggregates need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Source record (order, line) id; distinct ids are counted as records.
    pub record_id: i64,
    pub group: GroupKey,
    pub date: NaiveDate,
    pub amount: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTotal {
    pub id: i64,
    pub label: String,
    pub amount: f64,
    pub quantity: f64,
    pub records: usize,
}

/// Sum per group, sort by amount descending (ties by ascending id), keep `top_n`.
pub fn rank_groups(observations: &[Observation], top_n: usize) -> Vec<GroupTotal> {
    let mut groups: BTreeMap<i64, (String, f64, f64, Vec<i64>)> = BTreeMap::new();
    for obs in observations {
        let entry = groups
            .entry(obs.group.id)
            .or_insert_with(|| (obs.group.label.clone(), 0.0, 0.0, Vec::new()));
        entry.1 += obs.amount;
        entry.2 += obs.quantity;
        entry.3.push(obs.record_id);
    }

    let mut totals: Vec<GroupTotal> = groups
        .into_iter()
        .map(|(id, (label, amount, quantity, mut ids))| {
            ids.sort_unstable();
            ids.dedup();
            GroupTotal { id, label, amount, quantity, records: ids.len() }
        })
        .collect();

    totals.sort_by(|a, b| b.amount.total_cmp(&a.amount).then(a.id.cmp(&b.id)));
    totals.truncate(top_n);
    totals
}

/// Count of distinct source records.
pub fn distinct_records(observations: &[Observation]) -> usize {
    let mut ids: Vec<i64> = observations.iter().map(|o| o.record_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Day,
    Week,
    Month,
}

impl Bucket {
    pub fn parse(raw: &str) -> Result<Self, AnalyticsError> {
        match raw {
            "day" => Ok(Bucket::Day),
            "week" => Ok(Bucket::Week),
            "month" => Ok(Bucket::Month),
            other => Err(AnalyticsError::InvalidInput(format!(
                "unknown period bucket '{other}' (expected day, week or month)"
            ))),
        }
    }

    /// First day of the bucket containing `date`. Weeks start on Monday.
    pub fn start_of(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Bucket::Day => date,
            Bucket::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Bucket::Month => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Bucket::Day => start.format("%Y-%m-%d").to_string(),
            Bucket::Week => {
                let iso = start.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
            Bucket::Month => start.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: String,
    pub start: NaiveDate,
    pub amount: f64,
    pub quantity: f64,
    pub records: usize,
}

/// Bucket observations by period, in chronological order.
pub fn trend(observations: &[Observation], bucket: Bucket) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<NaiveDate, (f64, f64, Vec<i64>)> = BTreeMap::new();
    for obs in observations {
        let entry = buckets.entry(bucket.start_of(obs.date)).or_default();
        entry.0 += obs.amount;
        entry.1 += obs.quantity;
        entry.2.push(obs.record_id);
    }
    buckets
        .into_iter()
        .map(|(start, (amount, quantity, mut ids))| {
            ids.sort_unstable();
            ids.dedup();
            TrendPoint {
                period: bucket.label(start),
                start,
                amount,
                quantity,
                records: ids.len(),
            }
        })
        .collect()
}

/// Current versus previous period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    /// Absent when the previous total is zero.
    pub change_pct: Option<f64>,
}

impl PeriodComparison {
    pub fn new(current: f64, previous: f64) -> Self {
        let change = current - previous;
        let change_pct = (previous.abs() >= f64::EPSILON).then(|| change / previous * 100.0);
        Self { current, previous, change, change_pct }
    }
}
