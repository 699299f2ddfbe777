use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use erpbridge_core::{BridgeError, DateWindow};

/// What a figure was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputWindow {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub record_count: usize,
}

impl InputWindow {
    pub fn new(window: DateWindow, record_count: usize) -> Self {
        Self {
            date_from: window.from,
            date_to: window.to,
            record_count,
        }
    }
}

/// A computed metric together with its input window.
///
/// Never a bare number: callers can always audit which dates and how many
/// records produced the figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult<T> {
    pub window: InputWindow,
    pub metrics: T,
}

impl<T> AnalyticsResult<T> {
    pub fn new(window: InputWindow, metrics: T) -> Self {
        Self { window, metrics }
    }
}

/// A quotient with its operands disclosed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    pub value: f64,
    pub numerator: f64,
    pub denominator: f64,
}

impl Ratio {
    /// Fails instead of producing an infinite or NaN value.
    pub fn compute(name: &str, numerator: f64, denominator: f64, missing: &str) -> Result<Self, AnalyticsError> {
        if !numerator.is_finite() || !denominator.is_finite() {
            return Err(AnalyticsError::InvalidInput(format!(
                "{name}: operands must be finite numbers"
            )));
        }
        if denominator.abs() < f64::EPSILON {
            return Err(AnalyticsError::InsufficientData(format!(
                "cannot compute {name}: {missing} is zero or absent"
            )));
        }
        Ok(Self {
            value: numerator / denominator,
            numerator,
            denominator,
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalyticsError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid analytics input: {0}")]
    InvalidInput(String),
}

impl From<AnalyticsError> for BridgeError {
    fn from(value: AnalyticsError) -> Self {
        match value {
            AnalyticsError::InsufficientData(m) => BridgeError::insufficient_data(m),
            AnalyticsError::InvalidInput(m) => BridgeError::validation(m),
        }
    }
}

pub(crate) fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}
