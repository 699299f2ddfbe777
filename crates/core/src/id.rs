//! Strongly-typed references to remote records.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Identifier of a remote record. Always strictly positive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RecordId(i64);

impl RecordId {
    pub fn new(raw: i64) -> Result<Self, BridgeError> {
        if raw <= 0 {
            return Err(BridgeError::validation(format!(
                "record id must be a positive integer, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<i64> for RecordId {
    type Error = BridgeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordId> for i64 {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

impl FromStr for RecordId {
    type Err = BridgeError;

    /// Only plain ASCII digits are accepted: no sign, no whitespace, no
    /// leading zeros, so every id has exactly one textual form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = !s.is_empty()
            && s.bytes().all(|b| b.is_ascii_digit())
            && !(s.len() > 1 && s.starts_with('0'));
        if !well_formed {
            return Err(BridgeError::validation(format!(
                "'{s}' is not a positive integer id"
            )));
        }
        let raw: i64 = s
            .parse()
            .map_err(|e| BridgeError::validation(format!("'{s}': {e}")))?;
        Self::new(raw)
    }
}

/// Domain object reference: one record in one remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    collection: String,
    id: RecordId,
}

impl RecordRef {
    pub fn new(collection: impl Into<String>, id: RecordId) -> Self {
        Self {
            collection: collection.into(),
            id,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> RecordId {
        self.id
    }
}

impl core::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}({})", self.collection, self.id)
    }
}
