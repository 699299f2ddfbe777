//! Inclusive calendar windows used by analysis tools.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::query::parse_date;

/// Inclusive date range `[from, to]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> BridgeResult<Self> {
        if from > to {
            return Err(BridgeError::validation(format!(
                "date_from ({from}) must not be after date_to ({to})"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn parse(from: &str, to: &str) -> BridgeResult<Self> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// The equally long window ending the day before this one starts.
    pub fn previous(&self) -> Self {
        let to = self.from - Duration::days(1);
        let from = to - (self.to - self.from);
        Self { from, to }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    pub fn from_date_str(&self) -> String {
        self.from.format("%Y-%m-%d").to_string()
    }

    pub fn to_date_str(&self) -> String {
        self.to.format("%Y-%m-%d").to_string()
    }

    /// Inclusive upper bound for datetime fields (`YYYY-MM-DD 23:59:59`).
    pub fn to_end_of_day(&self) -> String {
        format!("{} 23:59:59", self.to_date_str())
    }
}
