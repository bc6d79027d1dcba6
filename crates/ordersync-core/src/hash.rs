//! Content hashing for change detection
//!
//! A row's digest is computed over a configured subset of columns, in the
//! canonical order the configuration defines. Values are canonicalized
//! before hashing (see [`CellValue::canonical`](crate::source::CellValue))
//! so upstream type drift does not register as a change.

use sha2::{Digest, Sha256};

use crate::source::SourceRow;

/// Separator between canonical values; keeps adjacent values from colliding
/// by concatenation ("ab","c" vs "a","bc").
const FIELD_SEPARATOR: u8 = 0x1F;

/// Computes stable content hashes over a fixed column list
#[derive(Debug, Clone)]
pub struct RowHasher {
    columns: Vec<String>,
}

impl RowHasher {
    /// Create a hasher; `columns` defines the canonical hashing order
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Digest of the configured columns of `row`, as lowercase hex SHA-256.
    ///
    /// Deterministic, NULL-safe, and unaffected by non-configured columns.
    #[must_use]
    pub fn hash_row(&self, row: &SourceRow) -> String {
        let mut hasher = Sha256::new();
        for column in &self.columns {
            hasher.update(row.get(column).canonical().as_bytes());
            hasher.update([FIELD_SEPARATOR]);
        }
        hex::encode(hasher.finalize())
    }

    /// Digest for one normalized line, over its composite key and quantity
    #[must_use]
    pub fn hash_line(size_code: &str, qty: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(size_code.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(qty.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}
