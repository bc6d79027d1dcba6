//! Row storage for headers, lines, and sync batches
//!
//! All SQL for the main tables lives here; the merge engine, batcher, and
//! sync client drive it. Operations take a shared connection so calls inside
//! a transaction can pass the transaction handle directly.

use rusqlite::types::Type;
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::Result;
use crate::models::{
    ActionType, BatchId, BatchStatus, OrderHeader, OrderLine, RecordId, SyncBatch, SyncState,
};
use crate::source::SourceRow;

fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

const HEADER_COLUMNS: &str = "record_uuid, order_no, customer, season, content, row_hash, \
     sync_state, action_type, external_id, last_error, created_at, updated_at, \
     sync_attempted_at, sync_completed_at";

const LINE_COLUMNS: &str = "record_uuid, size_code, qty, row_hash, sync_state, action_type, \
     external_id, external_parent_id, last_error, is_removed, created_at, updated_at, \
     sync_attempted_at, sync_completed_at";

/// `SQLite`-backed storage for the main order tables
pub struct OrderStore<'a> {
    conn: &'a Connection,
}

impl<'a> OrderStore<'a> {
    /// Create a store over the given connection (or open transaction)
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn parse_header(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderHeader> {
        let record_uuid: String = row.get(0)?;
        let content: String = row.get(4)?;
        let sync_state: String = row.get(6)?;
        let action_type: String = row.get(7)?;
        Ok(OrderHeader {
            record_uuid: record_uuid.parse().map_err(|e| conversion_err(0, e))?,
            order_no: row.get(1)?,
            customer: row.get(2)?,
            season: row.get(3)?,
            content: serde_json::from_str(&content).map_err(|e| conversion_err(4, e))?,
            row_hash: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            sync_state: sync_state.parse().map_err(|e| conversion_err(6, e))?,
            action_type: action_type.parse().map_err(|e| conversion_err(7, e))?,
            external_id: row.get(8)?,
            last_error: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            sync_attempted_at: row.get(12)?,
            sync_completed_at: row.get(13)?,
        })
    }

    pub(crate) fn parse_line(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderLine> {
        let record_uuid: String = row.get(0)?;
        let sync_state: String = row.get(4)?;
        let action_type: String = row.get(5)?;
        Ok(OrderLine {
            record_uuid: record_uuid.parse().map_err(|e| conversion_err(0, e))?,
            size_code: row.get(1)?,
            qty: row.get(2)?,
            row_hash: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            sync_state: sync_state.parse().map_err(|e| conversion_err(4, e))?,
            action_type: action_type.parse().map_err(|e| conversion_err(5, e))?,
            external_id: row.get(6)?,
            external_parent_id: row.get(7)?,
            last_error: row.get(8)?,
            is_removed: row.get::<_, i32>(9)? != 0,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            sync_attempted_at: row.get(12)?,
            sync_completed_at: row.get(13)?,
        })
    }

    // ------------------------------------------------------------------
    // Headers
    // ------------------------------------------------------------------

    /// Look up the surrogate key and stored hash for a business order number
    pub fn header_key_by_order_no(
        &self,
        order_no: &str,
    ) -> Result<Option<(RecordId, Option<String>)>> {
        let result = self.conn.query_row(
            "SELECT record_uuid, row_hash FROM order_headers WHERE order_no = ?",
            params![order_no],
            |row| {
                let id: String = row.get(0)?;
                let hash: Option<String> = row.get(1)?;
                Ok((id, hash))
            },
        );

        match result {
            Ok((id, hash)) => {
                let record_uuid = id
                    .parse()
                    .map_err(|e| conversion_err(0, e))
                    .map_err(crate::error::Error::Sqlite)?;
                Ok(Some((record_uuid, hash)))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a full header by business order number
    pub fn header_by_order_no(&self, order_no: &str) -> Result<Option<OrderHeader>> {
        let result = self.conn.query_row(
            &format!("SELECT {HEADER_COLUMNS} FROM order_headers WHERE order_no = ?"),
            params![order_no],
            Self::parse_header,
        );

        match result {
            Ok(header) => Ok(Some(header)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a freshly classified header
    pub fn insert_header(&self, header: &OrderHeader) -> Result<()> {
        self.conn.execute(
            "INSERT INTO order_headers (record_uuid, order_no, customer, season, content, \
             row_hash, sync_state, action_type, external_id, last_error, created_at, updated_at, \
             sync_attempted_at, sync_completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                header.record_uuid.as_str(),
                header.order_no,
                header.customer,
                header.season,
                header.content.to_string(),
                header.row_hash,
                header.sync_state.as_str(),
                header.action_type.as_str(),
                header.external_id,
                header.last_error,
                header.created_at,
                header.updated_at,
                header.sync_attempted_at,
                header.sync_completed_at,
            ],
        )?;
        Ok(())
    }

    /// Rewrite a changed header's content in place and re-enter it into the
    /// pending state; `external_id` is deliberately left untouched.
    pub fn update_header_content(
        &self,
        record_uuid: RecordId,
        customer: &str,
        season: Option<&str>,
        content: &Value,
        row_hash: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE order_headers
             SET customer = ?, season = ?, content = ?, row_hash = ?,
                 sync_state = ?, action_type = ?, last_error = NULL, updated_at = ?
             WHERE record_uuid = ?",
            params![
                customer,
                season,
                content.to_string(),
                row_hash,
                SyncState::Pending.as_str(),
                ActionType::Update.as_str(),
                now,
                record_uuid.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Headers awaiting sync, paired with their staged content rows
    pub fn pending_header_contents(&self) -> Result<Vec<(RecordId, SourceRow)>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_uuid, content FROM order_headers
             WHERE sync_state = ? ORDER BY created_at, order_no",
        )?;

        let rows = stmt
            .query_map(params![SyncState::Pending.as_str()], |row| {
                let id: String = row.get(0)?;
                let content: String = row.get(1)?;
                Ok((id, content))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, content) in rows {
            let record_uuid: RecordId = id
                .parse()
                .map_err(|e| crate::error::Error::InvalidInput(format!("bad record uuid: {e}")))?;
            let value: Value = serde_json::from_str(&content)?;
            out.push((record_uuid, SourceRow::from_json(value)?));
        }
        Ok(out)
    }

    /// Flip a header to SYNCED and persist its confirmed external id
    pub fn mark_header_synced(
        &self,
        record_uuid: RecordId,
        external_id: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE order_headers
             SET sync_state = ?, external_id = ?, last_error = NULL,
                 sync_completed_at = ?, updated_at = ?
             WHERE record_uuid = ?",
            params![
                SyncState::Synced.as_str(),
                external_id,
                now,
                now,
                record_uuid.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Flip a header to FAILED with a typed reason for later inspection
    pub fn mark_header_failed(&self, record_uuid: RecordId, reason: &str, now: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE order_headers
             SET sync_state = ?, last_error = ?, updated_at = ?
             WHERE record_uuid = ?",
            params![
                SyncState::Failed.as_str(),
                reason,
                now,
                record_uuid.as_str(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lines
    // ------------------------------------------------------------------

    /// All lines for a header, including logically removed ones
    pub fn lines_for(&self, record_uuid: RecordId) -> Result<Vec<OrderLine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE record_uuid = ? ORDER BY size_code"
        ))?;

        let lines = stmt
            .query_map(params![record_uuid.as_str()], Self::parse_line)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    /// Pending, non-removed lines for a header
    pub fn pending_lines_for(&self, record_uuid: RecordId) -> Result<Vec<OrderLine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines
             WHERE record_uuid = ? AND sync_state = ? AND is_removed = 0
             ORDER BY size_code"
        ))?;

        let lines = stmt
            .query_map(
                params![record_uuid.as_str(), SyncState::Pending.as_str()],
                Self::parse_line,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    /// Insert a freshly unpivoted line
    pub fn insert_line(&self, line: &OrderLine) -> Result<()> {
        self.conn.execute(
            "INSERT INTO order_lines (record_uuid, size_code, qty, row_hash, sync_state, \
             action_type, external_id, external_parent_id, last_error, is_removed, created_at, \
             updated_at, sync_attempted_at, sync_completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                line.record_uuid.as_str(),
                line.size_code,
                line.qty,
                line.row_hash,
                line.sync_state.as_str(),
                line.action_type.as_str(),
                line.external_id,
                line.external_parent_id,
                line.last_error,
                i32::from(line.is_removed),
                line.created_at,
                line.updated_at,
                line.sync_attempted_at,
                line.sync_completed_at,
            ],
        )?;
        Ok(())
    }

    /// Rewrite a changed line's quantity and re-enter it into PENDING,
    /// clearing any logical-removal mark
    pub fn update_line_qty(
        &self,
        record_uuid: RecordId,
        size_code: &str,
        qty: i64,
        row_hash: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE order_lines
             SET qty = ?, row_hash = ?, sync_state = ?, action_type = ?,
                 is_removed = 0, last_error = NULL, updated_at = ?
             WHERE record_uuid = ? AND size_code = ?",
            params![
                qty,
                row_hash,
                SyncState::Pending.as_str(),
                ActionType::Update.as_str(),
                now,
                record_uuid.as_str(),
                size_code,
            ],
        )?;
        Ok(())
    }

    /// Logically delete a line whose size no longer carries a positive
    /// quantity; synchronized lines are never physically deleted
    pub fn mark_line_removed(&self, record_uuid: RecordId, size_code: &str, now: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE order_lines SET is_removed = 1, updated_at = ?
             WHERE record_uuid = ? AND size_code = ?",
            params![now, record_uuid.as_str(), size_code],
        )?;
        Ok(())
    }

    /// Flip a line to SYNCED with its confirmed external and parent ids
    pub fn mark_line_synced(
        &self,
        record_uuid: RecordId,
        size_code: &str,
        external_id: &str,
        external_parent_id: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE order_lines
             SET sync_state = ?, external_id = ?, external_parent_id = ?,
                 last_error = NULL, sync_completed_at = ?, updated_at = ?
             WHERE record_uuid = ? AND size_code = ?",
            params![
                SyncState::Synced.as_str(),
                external_id,
                external_parent_id,
                now,
                now,
                record_uuid.as_str(),
                size_code,
            ],
        )?;
        Ok(())
    }

    /// Flip a line to FAILED with a typed reason
    pub fn mark_line_failed(
        &self,
        record_uuid: RecordId,
        size_code: &str,
        reason: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE order_lines SET sync_state = ?, last_error = ?, updated_at = ?
             WHERE record_uuid = ? AND size_code = ?",
            params![
                SyncState::Failed.as_str(),
                reason,
                now,
                record_uuid.as_str(),
                size_code,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sync batches
    // ------------------------------------------------------------------

    /// Record the start of a customer-scoped sync attempt
    pub fn create_batch(&self, batch: &SyncBatch) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_batches (id, customer, status, headers_attempted, headers_synced, \
             headers_failed, lines_attempted, lines_synced, lines_failed, started_at, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                batch.id.as_str(),
                batch.customer,
                batch.status.as_str(),
                batch.headers_attempted,
                batch.headers_synced,
                batch.headers_failed,
                batch.lines_attempted,
                batch.lines_synced,
                batch.lines_failed,
                batch.started_at,
                batch.finished_at,
            ],
        )?;
        Ok(())
    }

    /// Move a batch to its terminal state with final counts
    pub fn finalize_batch(&self, batch: &SyncBatch) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_batches
             SET status = ?, headers_synced = ?, headers_failed = ?,
                 lines_attempted = ?, lines_synced = ?, lines_failed = ?, finished_at = ?
             WHERE id = ? AND status = ?",
            params![
                batch.status.as_str(),
                batch.headers_synced,
                batch.headers_failed,
                batch.lines_attempted,
                batch.lines_synced,
                batch.lines_failed,
                batch.finished_at,
                batch.id.as_str(),
                BatchStatus::Running.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a batch record
    pub fn get_batch(&self, id: BatchId) -> Result<Option<SyncBatch>> {
        let result = self.conn.query_row(
            "SELECT id, customer, status, headers_attempted, headers_synced, headers_failed, \
             lines_attempted, lines_synced, lines_failed, started_at, finished_at
             FROM sync_batches WHERE id = ?",
            params![id.as_str()],
            |row| {
                let id: String = row.get(0)?;
                let status: String = row.get(2)?;
                Ok(SyncBatch {
                    id: id.parse().map_err(|e| conversion_err(0, e))?,
                    customer: row.get(1)?,
                    status: status.parse().map_err(|e| conversion_err(2, e))?,
                    headers_attempted: row.get(3)?,
                    headers_synced: row.get(4)?,
                    headers_failed: row.get(5)?,
                    lines_attempted: row.get(6)?,
                    lines_synced: row.get(7)?,
                    lines_failed: row.get(8)?,
                    started_at: row.get(9)?,
                    finished_at: row.get(10)?,
                })
            },
        );

        match result {
            Ok(batch) => Ok(Some(batch)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------

    /// Header counts per sync state, optionally scoped to one customer
    pub fn header_state_counts(&self, customer: Option<&str>) -> Result<Vec<(SyncState, i64)>> {
        self.state_counts("order_headers", customer)
    }

    /// Line counts per sync state, optionally scoped to one customer
    pub fn line_state_counts(&self, customer: Option<&str>) -> Result<Vec<(SyncState, i64)>> {
        let sql = customer.map_or_else(
            || {
                "SELECT sync_state, COUNT(*) FROM order_lines
                 WHERE is_removed = 0 GROUP BY sync_state ORDER BY sync_state"
                    .to_string()
            },
            |_| {
                "SELECT l.sync_state, COUNT(*) FROM order_lines l
                 JOIN order_headers h ON h.record_uuid = l.record_uuid
                 WHERE l.is_removed = 0 AND h.customer = ?
                 GROUP BY l.sync_state ORDER BY l.sync_state"
                    .to_string()
            },
        );
        self.collect_state_counts(&sql, customer)
    }

    fn state_counts(&self, table: &str, customer: Option<&str>) -> Result<Vec<(SyncState, i64)>> {
        let sql = customer.map_or_else(
            || format!("SELECT sync_state, COUNT(*) FROM {table} GROUP BY sync_state ORDER BY sync_state"),
            |_| {
                format!(
                    "SELECT sync_state, COUNT(*) FROM {table} WHERE customer = ?
                     GROUP BY sync_state ORDER BY sync_state"
                )
            },
        );
        self.collect_state_counts(&sql, customer)
    }

    fn collect_state_counts(
        &self,
        sql: &str,
        customer: Option<&str>,
    ) -> Result<Vec<(SyncState, i64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            let state: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((state, count))
        };
        let raw = match customer {
            Some(c) => stmt
                .query_map(params![c], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        raw.into_iter()
            .map(|(state, count)| Ok((state.parse()?, count)))
            .collect()
    }

    /// Failed headers with their typed reasons, for operator inspection
    pub fn failed_headers(&self, customer: Option<&str>) -> Result<Vec<(String, String)>> {
        let sql = customer.map_or_else(
            || {
                "SELECT order_no, COALESCE(last_error, '') FROM order_headers
                 WHERE sync_state = 'FAILED' ORDER BY order_no"
                    .to_string()
            },
            |_| {
                "SELECT order_no, COALESCE(last_error, '') FROM order_headers
                 WHERE sync_state = 'FAILED' AND customer = ? ORDER BY order_no"
                    .to_string()
            },
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| Ok((row.get(0)?, row.get(1)?));
        let rows = match customer {
            Some(c) => stmt
                .query_map(params![c], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::db::Database;

    fn header(order_no: &str, customer: &str) -> OrderHeader {
        let now = chrono::Utc::now().timestamp_millis();
        OrderHeader {
            record_uuid: RecordId::new(),
            order_no: order_no.to_string(),
            customer: customer.to_string(),
            season: None,
            content: json!({"order_no": order_no, "customer": customer}),
            row_hash: "h0".to_string(),
            sync_state: SyncState::Pending,
            action_type: ActionType::Insert,
            external_id: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            sync_attempted_at: None,
            sync_completed_at: None,
        }
    }

    fn line(record_uuid: RecordId, size_code: &str, qty: i64) -> OrderLine {
        let now = chrono::Utc::now().timestamp_millis();
        OrderLine {
            record_uuid,
            size_code: size_code.to_string(),
            qty,
            row_hash: "l0".to_string(),
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
        }
    }

    #[test]
    fn header_insert_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        let store = OrderStore::new(db.connection());

        let h = header("PO-1", "ACME");
        store.insert_header(&h).unwrap();

        let (id, hash) = store.header_key_by_order_no("PO-1").unwrap().unwrap();
        assert_eq!(id, h.record_uuid);
        assert_eq!(hash.as_deref(), Some("h0"));

        let fetched = store.header_by_order_no("PO-1").unwrap().unwrap();
        assert_eq!(fetched, h);

        assert!(store.header_key_by_order_no("PO-404").unwrap().is_none());
    }

    #[test]
    fn mark_header_synced_sets_external_id_and_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let store = OrderStore::new(db.connection());

        let h = header("PO-1", "ACME");
        store.insert_header(&h).unwrap();
        store.mark_header_synced(h.record_uuid, "E1", 42).unwrap();

        let fetched = store.header_by_order_no("PO-1").unwrap().unwrap();
        assert_eq!(fetched.sync_state, SyncState::Synced);
        assert_eq!(fetched.external_id.as_deref(), Some("E1"));
        assert_eq!(fetched.sync_completed_at, Some(42));
    }

    #[test]
    fn line_round_trip_and_removal() {
        let db = Database::open_in_memory().unwrap();
        let store = OrderStore::new(db.connection());

        let h = header("PO-1", "ACME");
        store.insert_header(&h).unwrap();
        store.insert_line(&line(h.record_uuid, "S", 5)).unwrap();
        store.insert_line(&line(h.record_uuid, "M", 2)).unwrap();

        assert_eq!(store.pending_lines_for(h.record_uuid).unwrap().len(), 2);

        store.mark_line_removed(h.record_uuid, "M", 99).unwrap();
        let pending = store.pending_lines_for(h.record_uuid).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].size_code, "S");

        // Removed line still exists physically
        assert_eq!(store.lines_for(h.record_uuid).unwrap().len(), 2);
    }

    #[test]
    fn batch_lifecycle_is_terminal() {
        let db = Database::open_in_memory().unwrap();
        let store = OrderStore::new(db.connection());

        let mut batch = SyncBatch {
            id: BatchId::new(),
            customer: "ACME".to_string(),
            status: BatchStatus::Running,
            headers_attempted: 2,
            headers_synced: 0,
            headers_failed: 0,
            lines_attempted: 3,
            lines_synced: 0,
            lines_failed: 0,
            started_at: 1,
            finished_at: None,
        };
        store.create_batch(&batch).unwrap();

        batch.status = BatchStatus::Completed;
        batch.headers_synced = 2;
        batch.lines_synced = 3;
        batch.finished_at = Some(2);
        store.finalize_batch(&batch).unwrap();

        let fetched = store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(fetched.status, BatchStatus::Completed);

        // Finalizing again must not mutate a terminal batch
        batch.status = BatchStatus::Failed;
        store.finalize_batch(&batch).unwrap();
        let fetched = store.get_batch(batch.id).unwrap().unwrap();
        assert_eq!(fetched.status, BatchStatus::Completed);
    }

    #[test]
    fn state_counts_scoped_by_customer() {
        let db = Database::open_in_memory().unwrap();
        let store = OrderStore::new(db.connection());

        store.insert_header(&header("PO-1", "ACME")).unwrap();
        store.insert_header(&header("PO-2", "ACME")).unwrap();
        store.insert_header(&header("PO-3", "GLOBEX")).unwrap();

        let all = store.header_state_counts(None).unwrap();
        assert_eq!(all, vec![(SyncState::Pending, 3)]);

        let acme = store.header_state_counts(Some("ACME")).unwrap();
        assert_eq!(acme, vec![(SyncState::Pending, 2)]);
    }
}
