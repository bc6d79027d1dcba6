//! Order header model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{ActionType, SyncState};

/// Stable surrogate key for an order header, using UUID v7 (time-sortable).
///
/// Generated once when a business order number is first seen and never
/// reused; lines reference their parent header through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Mint a new surrogate key
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One order record at business-order-number granularity, prior to size
/// breakdown.
///
/// `content` holds the configured open set of business attributes (customer,
/// style, dates, prices, size quantities) exactly as staged, in source column
/// order; `row_hash` is the digest over the configured subset of those
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub record_uuid: RecordId,
    /// Customer-defined order number; unique within the target tables
    pub order_no: String,
    pub customer: String,
    pub season: Option<String>,
    /// Staged wide-row content as a JSON object, column order preserved
    pub content: serde_json::Value,
    pub row_hash: String,
    pub sync_state: SyncState,
    pub action_type: ActionType,
    /// Remote item id; set once the external system confirms creation and
    /// never cleared afterwards, only overwritten
    pub external_id: Option<String>,
    /// Typed reason string from the last failed sync attempt
    pub last_error: Option<String>,
    /// Unix ms
    pub created_at: i64,
    /// Unix ms
    pub updated_at: i64,
    pub sync_attempted_at: Option<i64>,
    pub sync_completed_at: Option<i64>,
}
