//! External board API contract
//!
//! The remote work-management system is abstracted behind [`BoardApi`]: one
//! batched call carrying several mutations, returning a per-mutation outcome.
//! Any remote exposing create/update item, create/update sub-item, batched
//! mutation, and a transient/permanent error distinction is substitutable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RecordId;

/// One remote mutation within a batched call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BoardMutation {
    CreateItem {
        record_uuid: RecordId,
        name: String,
        fields: serde_json::Value,
    },
    UpdateItem {
        record_uuid: RecordId,
        external_id: String,
        fields: serde_json::Value,
    },
    CreateSubitem {
        record_uuid: RecordId,
        size_code: String,
        parent_external_id: String,
        name: String,
        qty: i64,
    },
    UpdateSubitem {
        record_uuid: RecordId,
        size_code: String,
        external_id: String,
        qty: i64,
    },
}

impl BoardMutation {
    /// Surrogate key of the record this mutation belongs to
    #[must_use]
    pub const fn record_uuid(&self) -> RecordId {
        match self {
            Self::CreateItem { record_uuid, .. }
            | Self::UpdateItem { record_uuid, .. }
            | Self::CreateSubitem { record_uuid, .. }
            | Self::UpdateSubitem { record_uuid, .. } => *record_uuid,
        }
    }

    /// Human-readable key for log and error messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CreateItem { name, .. } => format!("create item '{name}'"),
            Self::UpdateItem { external_id, .. } => format!("update item '{external_id}'"),
            Self::CreateSubitem {
                name, size_code, ..
            } => format!("create sub-item '{name}/{size_code}'"),
            Self::UpdateSubitem {
                external_id,
                size_code,
                ..
            } => format!("update sub-item '{external_id}/{size_code}'"),
        }
    }
}

/// Per-mutation result of a successful batched call.
///
/// `Rejected` is the remote's permanent, data-attributable refusal of one
/// record; it never consumes retry budget on its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationOutcome {
    Created { external_id: String },
    Updated { external_id: String },
    Rejected { reason: String },
}

/// Transport-level failure of a whole batched call
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The call did not complete within its timeout
    #[error("remote call timed out")]
    Timeout,

    /// Remote asked us to slow down (HTTP 429)
    #[error("rate limited by remote")]
    RateLimited,

    /// 5xx-class remote failure
    #[error("remote server error: HTTP {0}")]
    Server(u16),

    /// Remote rejected the request outright (non-retryable 4xx)
    #[error("remote API error: {1} (HTTP {0})")]
    Api(u16, String),

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape
    #[error("invalid remote payload: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    /// Transient errors are absorbed by the shrinking-batch retry ladder;
    /// permanent ones mark their items FAILED immediately.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited | Self::Server(_) => true,
            Self::Api(..) | Self::InvalidPayload(_) => false,
            // Connect resets and dropped sockets are worth a smaller retry
            Self::Transport(e) => !e.is_builder() && !e.is_decode(),
        }
    }
}

/// A remote service accepting batched mutations.
///
/// One `execute` call is one network round-trip; outcomes are returned
/// positionally, matching the input slice.
pub trait BoardApi {
    fn execute(
        &self,
        mutations: &[BoardMutation],
    ) -> impl std::future::Future<Output = Result<Vec<MutationOutcome>, RemoteError>> + Send;
}
