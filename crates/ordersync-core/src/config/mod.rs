//! Sync configuration
//!
//! One immutable [`SyncSettings`] value describes the column mappings, size
//! marker columns, and external-system defaults for a run. It is constructed
//! once (usually from a JSON file) and passed by reference into each
//! component; there is no ambient singleton.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_batch_sizes() -> Vec<usize> {
    vec![15, 5, 1]
}

const fn default_call_timeout_secs() -> u64 {
    25
}

/// Column mappings and external-system defaults for one sync run
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    /// Content columns hashed for change detection, in canonical order
    pub hash_columns: Vec<String>,
    /// Column holding the customer-defined order number (business key)
    pub order_column: String,
    /// Column holding the customer name; batches are grouped by it
    pub customer_column: String,
    /// Optional column used for the season batch filter
    #[serde(default)]
    pub season_column: Option<String>,
    /// Size columns sit strictly between these two marker columns
    pub size_start_marker: String,
    pub size_end_marker: String,
    /// Shrinking sub-batch sizes for the remote retry ladder
    #[serde(default = "default_batch_sizes")]
    pub batch_sizes: Vec<usize>,
    /// Per-call timeout for remote mutations
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Optional ceiling on total elapsed time for one customer batch
    #[serde(default)]
    pub batch_deadline_secs: Option<u64>,
    /// Base URL of the external board API
    #[serde(default)]
    pub api_endpoint: Option<String>,
    /// Bearer credential for the external board API
    #[serde(default)]
    pub api_token: Option<String>,
}

impl SyncSettings {
    /// Load settings from a JSON file and validate them
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the column mapping and retry ladder for fatal misconfiguration
    pub fn validate(&self) -> Result<()> {
        if self.hash_columns.is_empty() {
            return Err(Error::Configuration(
                "hash_columns must name at least one column".to_string(),
            ));
        }
        if self.hash_columns.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::Configuration(
                "hash_columns must not contain blank names".to_string(),
            ));
        }
        for (name, value) in [
            ("order_column", &self.order_column),
            ("customer_column", &self.customer_column),
            ("size_start_marker", &self.size_start_marker),
            ("size_end_marker", &self.size_end_marker),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Configuration(format!("{name} must not be blank")));
            }
        }
        if self.size_start_marker == self.size_end_marker {
            return Err(Error::Configuration(
                "size marker columns must differ".to_string(),
            ));
        }
        if self.batch_sizes.is_empty() {
            return Err(Error::Configuration(
                "batch_sizes must not be empty".to_string(),
            ));
        }
        if !self.batch_sizes.windows(2).all(|w| w[0] > w[1]) {
            return Err(Error::Configuration(
                "batch_sizes must be strictly decreasing".to_string(),
            ));
        }
        if self.batch_sizes.last() != Some(&1) {
            return Err(Error::Configuration(
                "batch_sizes must end at 1 so failures are item-attributable".to_string(),
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(Error::Configuration(
                "call_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-call timeout as a duration
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Batch-level deadline as a duration, when configured
    #[must_use]
    pub fn batch_deadline(&self) -> Option<Duration> {
        self.batch_deadline_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("hash_columns", &self.hash_columns)
            .field("order_column", &self.order_column)
            .field("customer_column", &self.customer_column)
            .field("season_column", &self.season_column)
            .field("size_start_marker", &self.size_start_marker)
            .field("size_end_marker", &self.size_end_marker)
            .field("batch_sizes", &self.batch_sizes)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("batch_deadline_secs", &self.batch_deadline_secs)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn valid() -> SyncSettings {
        serde_json::from_str(
            r#"{
                "hash_columns": ["customer", "style", "S", "M"],
                "order_column": "order_no",
                "customer_column": "customer",
                "season_column": "season",
                "size_start_marker": "size_start",
                "size_end_marker": "size_end"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_applied_and_valid() {
        let settings = valid();
        settings.validate().unwrap();
        assert_eq!(settings.batch_sizes, vec![15, 5, 1]);
        assert_eq!(settings.call_timeout_secs, 25);
        assert!(settings.batch_deadline().is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = serde_json::from_str::<SyncSettings>(
            r#"{
                "hash_columns": ["a"],
                "order_column": "order_no",
                "customer_column": "customer",
                "size_start_marker": "s",
                "size_end_marker": "e",
                "surprise": true
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_empty_hash_columns() {
        let mut settings = valid();
        settings.hash_columns.clear();
        assert!(matches!(
            settings.validate(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn rejects_identical_markers() {
        let mut settings = valid();
        settings.size_end_marker.clone_from(&settings.size_start_marker);
        assert!(matches!(settings.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn rejects_bad_batch_ladder() {
        let mut settings = valid();
        settings.batch_sizes = vec![15, 15, 1];
        assert!(settings.validate().is_err());

        settings.batch_sizes = vec![15, 5];
        assert!(settings.validate().is_err());

        settings.batch_sizes = vec![15, 5, 1];
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn debug_redacts_api_token() {
        let mut settings = valid();
        settings.api_token = Some("secret-bearer".to_string());
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret-bearer"));
        assert!(debug.contains("[REDACTED]"));
    }
}
