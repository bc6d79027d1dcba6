//! Order line model

use serde::{Deserialize, Serialize};

use super::header::RecordId;
use super::state::{ActionType, SyncState};

/// One (order, size) quantity record derived from unpivoting a header's
/// size columns.
///
/// Composite business key: (`record_uuid`, `size_code`). A line is owned by
/// exactly one header; once synchronized it is never physically deleted,
/// only marked `is_removed` when its size drops out of the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub record_uuid: RecordId,
    /// Size column name from the source (e.g. "S", "M", "XL")
    pub size_code: String,
    /// Always positive; non-positive quantities are never materialized
    pub qty: i64,
    pub row_hash: String,
    pub sync_state: SyncState,
    pub action_type: ActionType,
    /// Remote sub-item id
    pub external_id: Option<String>,
    /// Remote id of the parent header's item
    pub external_parent_id: Option<String>,
    pub last_error: Option<String>,
    /// Logical delete flag; replaces physical deletion for synced lines
    pub is_removed: bool,
    /// Unix ms
    pub created_at: i64,
    /// Unix ms
    pub updated_at: i64,
    pub sync_attempted_at: Option<i64>,
    pub sync_completed_at: Option<i64>,
}

/// Normalized output of the size unpivoter, before persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTuple {
    pub record_uuid: RecordId,
    pub size_code: String,
    pub qty: i64,
}
