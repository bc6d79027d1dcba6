//! Change-detection merge engine
//!
//! Merges a staged snapshot of wide source rows into the durable header and
//! line tables. Each header is classified NEW / CHANGED / UNCHANGED by
//! comparing its recomputed content hash against the stored one; NEW and
//! CHANGED rows re-enter the PENDING state for the sync client to pick up.
//! The whole invocation runs in one transaction: a mid-merge failure leaves
//! the target tables untouched.

use rusqlite::Connection;

use super::repository::OrderStore;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::hash::RowHasher;
use crate::models::{ActionType, OrderHeader, OrderLine, RecordId, SyncState};
use crate::source::SourceRow;
use crate::unpivot::SizeUnpivoter;

/// Counts reported by one merge invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MergeReport {
    /// Non-blank staged rows classified
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Blank or unkeyed rows discarded before classification
    pub skipped: usize,
    pub lines_inserted: usize,
    pub lines_updated: usize,
    /// Lines logically deleted because their size lost its quantity
    pub lines_removed: usize,
}

/// Merges staged source rows into the main tables with hash-based change
/// detection
pub struct MergeEngine<'s> {
    settings: &'s SyncSettings,
    hasher: RowHasher,
    unpivoter: SizeUnpivoter,
}

impl<'s> MergeEngine<'s> {
    /// Build an engine from validated settings
    #[must_use]
    pub fn new(settings: &'s SyncSettings) -> Self {
        Self {
            settings,
            hasher: RowHasher::new(settings.hash_columns.clone()),
            unpivoter: SizeUnpivoter::new(
                settings.size_start_marker.clone(),
                settings.size_end_marker.clone(),
            ),
        }
    }

    /// Merge a staged snapshot, atomically.
    ///
    /// The header pass classifies rows by business order number; the line
    /// pass then unpivots size columns for every PENDING header. A
    /// reconciliation mismatch between staged and classified row counts
    /// rolls the transaction back with [`Error::MergeValidation`].
    pub fn merge(&self, conn: &mut Connection, rows: &[SourceRow]) -> Result<MergeReport> {
        let tx = conn.transaction()?;
        let report = self.merge_in_tx(&tx, rows)?;
        tx.commit()?;

        tracing::info!(
            processed = report.processed,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            lines_inserted = report.lines_inserted,
            lines_updated = report.lines_updated,
            lines_removed = report.lines_removed,
            "merge completed"
        );
        Ok(report)
    }

    fn merge_in_tx(&self, tx: &Connection, rows: &[SourceRow]) -> Result<MergeReport> {
        let store = OrderStore::new(tx);
        let mut report = MergeReport::default();

        let mut staged: Vec<&SourceRow> = Vec::with_capacity(rows.len());
        for row in rows {
            if !self.is_discardable(row)? {
                staged.push(row);
            }
        }
        report.skipped = rows.len() - staged.len();

        for row in &staged {
            self.merge_header(&store, row, &mut report)?;
        }

        let classified = report.inserted + report.updated + report.unchanged;
        if classified != staged.len() {
            return Err(Error::MergeValidation {
                expected: staged.len(),
                actual: classified,
            });
        }
        report.processed = classified;

        // Lines merge runs strictly after the header pass, over every header
        // still awaiting sync, unpivoting from its current stored content.
        for (record_uuid, content) in store.pending_header_contents()? {
            self.merge_lines(&store, record_uuid, &content, &mut report)?;
        }

        Ok(report)
    }

    /// Blank key-and-quantity rows carry nothing to merge; rows with
    /// quantities but no business key cannot be keyed and are dropped too.
    /// A row missing its size markers is a fatal configuration error even
    /// when it otherwise looks blank.
    fn is_discardable(&self, row: &SourceRow) -> Result<bool> {
        let size_columns = self.unpivoter.size_columns(row)?;
        if row.is_blank(&[&self.settings.order_column], &size_columns) {
            return Ok(true);
        }
        if row.text(&self.settings.order_column).is_none() {
            tracing::warn!("dropping source row without a business order number");
            return Ok(true);
        }
        Ok(false)
    }

    fn merge_header(
        &self,
        store: &OrderStore<'_>,
        row: &SourceRow,
        report: &mut MergeReport,
    ) -> Result<()> {
        let order_no = row
            .text(&self.settings.order_column)
            .ok_or_else(|| Error::InvalidInput("order number vanished mid-merge".to_string()))?;
        let customer = row.text(&self.settings.customer_column).ok_or_else(|| {
            Error::InvalidInput(format!("source row '{order_no}' has no customer"))
        })?;
        let season = self
            .settings
            .season_column
            .as_deref()
            .and_then(|col| row.text(col));
        let row_hash = self.hasher.hash_row(row);
        let now = chrono::Utc::now().timestamp_millis();

        match store.header_key_by_order_no(&order_no)? {
            None => {
                let header = OrderHeader {
                    record_uuid: RecordId::new(),
                    order_no,
                    customer,
                    season,
                    content: row.as_content(),
                    row_hash,
                    sync_state: SyncState::Pending,
                    action_type: ActionType::Insert,
                    external_id: None,
                    last_error: None,
                    created_at: now,
                    updated_at: now,
                    sync_attempted_at: None,
                    sync_completed_at: None,
                };
                store.insert_header(&header)?;
                report.inserted += 1;
            }
            // A NULL stored hash covers first-time sync of a pre-existing
            // row; it always classifies as CHANGED.
            Some((record_uuid, stored_hash)) if stored_hash.as_deref() != Some(&row_hash) => {
                store.update_header_content(
                    record_uuid,
                    &customer,
                    season.as_deref(),
                    &row.as_content(),
                    &row_hash,
                    now,
                )?;
                report.updated += 1;
            }
            Some(_) => {
                report.unchanged += 1;
            }
        }
        Ok(())
    }

    fn merge_lines(
        &self,
        store: &OrderStore<'_>,
        record_uuid: RecordId,
        content: &SourceRow,
        report: &mut MergeReport,
    ) -> Result<()> {
        let tuples = self.unpivoter.unpivot(record_uuid, content)?;
        let existing = store.lines_for(record_uuid)?;
        let now = chrono::Utc::now().timestamp_millis();

        for tuple in &tuples {
            let line_hash = RowHasher::hash_line(&tuple.size_code, tuple.qty);
            match existing.iter().find(|l| l.size_code == tuple.size_code) {
                None => {
                    store.insert_line(&OrderLine {
                        record_uuid,
                        size_code: tuple.size_code.clone(),
                        qty: tuple.qty,
                        row_hash: line_hash,
                        sync_state: SyncState::Pending,
                        action_type: ActionType::Insert,
                        external_id: None,
                        external_parent_id: None,
                        last_error: None,
                        is_removed: false,
                        created_at: now,
                        updated_at: now,
                        sync_attempted_at: None,
                        sync_completed_at: None,
                    })?;
                    report.lines_inserted += 1;
                }
                Some(line) if line.row_hash != line_hash || line.is_removed => {
                    store.update_line_qty(
                        record_uuid,
                        &tuple.size_code,
                        tuple.qty,
                        &line_hash,
                        now,
                    )?;
                    report.lines_updated += 1;
                }
                Some(_) => {}
            }
        }

        for line in &existing {
            let survives = tuples.iter().any(|t| t.size_code == line.size_code);
            if !survives && !line.is_removed {
                store.mark_line_removed(record_uuid, &line.size_code, now)?;
                report.lines_removed += 1;
            }
        }

        Ok(())
    }
}
