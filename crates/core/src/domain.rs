//! Business domains exposed by the bridge.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// A business area of the ERP backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Sales,
    Purchase,
    Inventory,
    Accounting,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Sales,
        Domain::Purchase,
        Domain::Inventory,
        Domain::Accounting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Sales => "sales",
            Domain::Purchase => "purchase",
            Domain::Inventory => "inventory",
            Domain::Accounting => "accounting",
        }
    }
}

impl core::fmt::Display for Domain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                BridgeError::validation(format!(
                    "unknown domain '{s}' (expected one of: sales, purchase, inventory, accounting)"
                ))
            })
    }
}
