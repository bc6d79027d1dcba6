//! Sync batch models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::header::OrderHeader;
use super::line::OrderLine;
use crate::error::Error;

/// Identifier for one customer-scoped sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle of a recorded sync attempt; terminal states are immutable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown batch status: {other}"))),
        }
    }
}

/// Durable record of one customer-scoped sync attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub id: BatchId,
    pub customer: String,
    pub status: BatchStatus,
    pub headers_attempted: i64,
    pub headers_synced: i64,
    pub headers_failed: i64,
    pub lines_attempted: i64,
    pub lines_synced: i64,
    pub lines_failed: i64,
    /// Unix ms
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

/// Unit of work handed to the external sync client: all pending headers for
/// one customer, each joined with its pending lines.
///
/// One batch never spans customers, so an external-sync call graph stays
/// scoped to a single customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerBatch {
    pub customer: String,
    pub headers: Vec<(OrderHeader, Vec<OrderLine>)>,
}

impl CustomerBatch {
    /// Total pending lines across all headers in this batch
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.headers.iter().map(|(_, lines)| lines.len()).sum()
    }
}
