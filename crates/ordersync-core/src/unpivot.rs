//! Size unpivoting
//!
//! Wide rows carry one column per size. The columns strictly between two
//! configured marker columns are the size columns; unpivoting turns them
//! into normalized (record key, size label, quantity) tuples, dropping
//! non-positive quantities.

use crate::error::{Error, Result};
use crate::models::{LineTuple, RecordId};
use crate::source::SourceRow;

/// Unpivots per-size quantity columns into normalized line tuples
#[derive(Debug, Clone)]
pub struct SizeUnpivoter {
    start_marker: String,
    end_marker: String,
}

impl SizeUnpivoter {
    /// Create an unpivoter bracketing size columns between two markers
    #[must_use]
    pub fn new(start_marker: impl Into<String>, end_marker: impl Into<String>) -> Self {
        Self {
            start_marker: start_marker.into(),
            end_marker: end_marker.into(),
        }
    }

    /// Names of the size columns in `row`, in source order.
    ///
    /// Fails with a configuration error rather than guessing positions when
    /// either marker is absent or the markers are out of order.
    pub fn size_columns(&self, row: &SourceRow) -> Result<Vec<String>> {
        let columns: Vec<&str> = row.columns().collect();
        let start = columns
            .iter()
            .position(|c| *c == self.start_marker)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "size start marker column '{}' not found in source row",
                    self.start_marker
                ))
            })?;
        let end = columns
            .iter()
            .position(|c| *c == self.end_marker)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "size end marker column '{}' not found in source row",
                    self.end_marker
                ))
            })?;
        if start >= end {
            return Err(Error::Configuration(format!(
                "size start marker '{}' does not precede end marker '{}'",
                self.start_marker, self.end_marker
            )));
        }
        Ok(columns[start + 1..end]
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// One tuple per size column holding a positive quantity; null, zero,
    /// and negative quantities never produce a line.
    pub fn unpivot(&self, record_uuid: RecordId, row: &SourceRow) -> Result<Vec<LineTuple>> {
        let mut tuples = Vec::new();
        for size_code in self.size_columns(row)? {
            let Some(qty) = row.get(&size_code).as_qty() else {
                continue;
            };
            if qty <= 0 {
                continue;
            }
            tuples.push(LineTuple {
                record_uuid,
                size_code,
                qty,
            });
        }
        Ok(tuples)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn row(value: serde_json::Value) -> SourceRow {
        SourceRow::from_json(value).unwrap()
    }

    #[test]
    fn unpivot_drops_zero_and_negative_quantities() {
        let r = row(json!({
            "order_no": "PO-1",
            "size_start": "",
            "XS": 0, "S": 5, "M": -1, "L": 3,
            "size_end": ""
        }));
        let id = RecordId::new();
        let tuples = SizeUnpivoter::new("size_start", "size_end")
            .unpivot(id, &r)
            .unwrap();
        let got: Vec<(&str, i64)> = tuples
            .iter()
            .map(|t| (t.size_code.as_str(), t.qty))
            .collect();
        assert_eq!(got, vec![("S", 5), ("L", 3)]);
        assert!(tuples.iter().all(|t| t.record_uuid == id));
    }

    #[test]
    fn unpivot_skips_null_and_non_numeric() {
        let r = row(json!({
            "size_start": "", "S": null, "M": "tbd", "L": "4", "size_end": ""
        }));
        let tuples = SizeUnpivoter::new("size_start", "size_end")
            .unpivot(RecordId::new(), &r)
            .unwrap();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].size_code, "L");
        assert_eq!(tuples[0].qty, 4);
    }

    #[test]
    fn missing_start_marker_is_a_configuration_error() {
        let r = row(json!({"S": 1, "size_end": ""}));
        let err = SizeUnpivoter::new("size_start", "size_end")
            .size_columns(&r)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn missing_end_marker_is_a_configuration_error() {
        let r = row(json!({"size_start": "", "S": 1}));
        let err = SizeUnpivoter::new("size_start", "size_end")
            .size_columns(&r)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn out_of_order_markers_are_rejected() {
        let r = row(json!({"size_end": "", "S": 1, "size_start": ""}));
        let err = SizeUnpivoter::new("size_start", "size_end")
            .size_columns(&r)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn empty_size_range_yields_no_lines() {
        let r = row(json!({"size_start": "", "size_end": ""}));
        let unpivoter = SizeUnpivoter::new("size_start", "size_end");
        assert!(unpivoter.size_columns(&r).unwrap().is_empty());
        assert!(unpivoter.unpivot(RecordId::new(), &r).unwrap().is_empty());
    }
}
