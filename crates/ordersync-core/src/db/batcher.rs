//! Customer batcher
//!
//! Selects PENDING headers with their PENDING lines and groups them strictly
//! by customer into units of work for the external sync client. A selection
//! with no discriminating filter is rejected outright so an accidental
//! full-table resync cannot happen.

use rusqlite::{params_from_iter, Connection};

use super::repository::OrderStore;
use crate::error::{Error, Result};
use crate::models::{ActionType, CustomerBatch, OrderHeader, SyncState};

/// Filter narrowing a pending selection; at least one field must be set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchFilter {
    pub customer: Option<String>,
    pub order_no: Option<String>,
    pub season: Option<String>,
}

impl BatchFilter {
    /// True when no discriminating filter was supplied
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.customer.is_none() && self.order_no.is_none() && self.season.is_none()
    }

    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(customer) = &self.customer {
            clauses.push("customer = ?");
            values.push(customer.clone());
        }
        if let Some(order_no) = &self.order_no {
            clauses.push("order_no = ?");
            values.push(order_no.clone());
        }
        if let Some(season) = &self.season {
            clauses.push("season = ?");
            values.push(season.clone());
        }
        (clauses.join(" AND "), values)
    }
}

/// Groups pending work into customer-scoped batches
pub struct CustomerBatcher;

impl CustomerBatcher {
    /// Select all PENDING headers matching `filter`, join their PENDING
    /// lines, and group them by customer in header creation order.
    ///
    /// Every selected header and line gets `sync_attempted_at` stamped in
    /// the same transaction, acting as a lease so a concurrent batcher run
    /// does not double-submit the rows.
    pub fn select_pending(conn: &mut Connection, filter: &BatchFilter) -> Result<Vec<CustomerBatch>> {
        if filter.is_empty() {
            return Err(Error::EmptyFilter);
        }

        let tx = conn.transaction()?;
        let batches = Self::select_in_tx(&tx, filter)?;
        tx.commit()?;

        tracing::debug!(
            batches = batches.len(),
            headers = batches.iter().map(|b| b.headers.len()).sum::<usize>(),
            "selected pending work"
        );
        Ok(batches)
    }

    fn select_in_tx(tx: &Connection, filter: &BatchFilter) -> Result<Vec<CustomerBatch>> {
        let store = OrderStore::new(tx);
        let (clause, values) = filter.where_clause();

        let sql = format!(
            "SELECT record_uuid, order_no, customer, season, content, row_hash, sync_state, \
             action_type, external_id, last_error, created_at, updated_at, sync_attempted_at, \
             sync_completed_at
             FROM order_headers
             WHERE sync_state = '{}' AND {clause}
             ORDER BY created_at, order_no",
            SyncState::Pending.as_str()
        );
        let mut stmt = tx.prepare(&sql)?;
        let headers: Vec<OrderHeader> = stmt
            .query_map(params_from_iter(values), OrderStore::parse_header)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let now = chrono::Utc::now().timestamp_millis();
        let mut batches: Vec<CustomerBatch> = Vec::new();
        for header in headers {
            let lines = store.pending_lines_for(header.record_uuid)?;

            tx.execute(
                "UPDATE order_headers SET sync_attempted_at = ? WHERE record_uuid = ?",
                rusqlite::params![now, header.record_uuid.as_str()],
            )?;
            tx.execute(
                "UPDATE order_lines SET sync_attempted_at = ?
                 WHERE record_uuid = ? AND sync_state = ? AND is_removed = 0",
                rusqlite::params![
                    now,
                    header.record_uuid.as_str(),
                    SyncState::Pending.as_str()
                ],
            )?;

            match batches.iter_mut().find(|b| b.customer == header.customer) {
                Some(batch) => batch.headers.push((header, lines)),
                None => batches.push(CustomerBatch {
                    customer: header.customer.clone(),
                    headers: vec![(header, lines)],
                }),
            }
        }

        Ok(batches)
    }

    /// Explicitly re-queue FAILED headers and lines matching `filter` back
    /// to PENDING. Returns the number of re-queued headers.
    ///
    /// A line can fail under a header that synced; re-queuing it alone would
    /// strand it, since selection only reads PENDING headers. Any SYNCED
    /// header left owning PENDING lines is therefore re-opened as PENDING
    /// with action UPDATE, keeping its external id so the re-sync updates in
    /// place.
    ///
    /// This is the only path out of FAILED; nothing retries failed rows
    /// automatically.
    pub fn requeue_failed(conn: &mut Connection, filter: &BatchFilter) -> Result<usize> {
        if filter.is_empty() {
            return Err(Error::EmptyFilter);
        }

        let tx = conn.transaction()?;
        let (clause, values) = filter.where_clause();

        let lines_sql = format!(
            "UPDATE order_lines SET sync_state = '{pending}', last_error = NULL
             WHERE sync_state = '{failed}' AND record_uuid IN (
                 SELECT record_uuid FROM order_headers WHERE {clause}
             )",
            pending = SyncState::Pending.as_str(),
            failed = SyncState::Failed.as_str(),
        );
        tx.execute(&lines_sql, params_from_iter(values.iter()))?;

        let headers_sql = format!(
            "UPDATE order_headers SET sync_state = '{pending}', last_error = NULL
             WHERE sync_state = '{failed}' AND {clause}",
            pending = SyncState::Pending.as_str(),
            failed = SyncState::Failed.as_str(),
        );
        let requeued = tx.execute(&headers_sql, params_from_iter(values.iter()))?;

        let reopen_sql = format!(
            "UPDATE order_headers SET sync_state = '{pending}', action_type = '{update}'
             WHERE sync_state = '{synced}' AND {clause} AND record_uuid IN (
                 SELECT record_uuid FROM order_lines
                 WHERE sync_state = '{pending}' AND is_removed = 0
             )",
            pending = SyncState::Pending.as_str(),
            synced = SyncState::Synced.as_str(),
            update = ActionType::Update.as_str(),
        );
        let reopened = tx.execute(&reopen_sql, params_from_iter(values.iter()))?;

        tx.commit()?;
        tracing::info!(requeued, reopened, "re-queued failed work");
        Ok(requeued + reopened)
    }
}
