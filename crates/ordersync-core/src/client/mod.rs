//! External sync client
//!
//! Turns a customer batch into batched remote mutations with a
//! shrinking-batch-size retry ladder, bounded per-call timeouts, and an
//! optional batch-level deadline. Headers always reach a terminal outcome
//! before their lines are attempted; lines of a failed header are left
//! PENDING. Results are written back onto the records, so the protocol is
//! restart-safe: "create if absent, else update" keyed by the stored
//! external id.

mod api;
mod http;

pub use api::{BoardApi, BoardMutation, MutationOutcome, RemoteError};
pub use http::HttpBoardApi;

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use serde_json::json;

use crate::config::SyncSettings;
use crate::db::OrderStore;
use crate::error::Result;
use crate::models::{BatchId, BatchStatus, CustomerBatch, RecordId, SyncBatch};

const DEADLINE_REASON: &str = "batch deadline exceeded";

/// Outcome of one customer-scoped sync attempt
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    pub batch_id: String,
    pub customer: String,
    pub headers_synced: usize,
    pub headers_failed: usize,
    pub lines_synced: usize,
    pub lines_failed: usize,
    /// Typed reason strings for every failed item
    pub errors: Vec<String>,
}

/// Terminal result of one mutation after the retry ladder
#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemResult {
    Synced { external_id: String },
    Failed { reason: String },
}

/// Batched, retrying client for one external board API
pub struct SyncClient<A> {
    api: A,
    batch_sizes: Vec<usize>,
    call_timeout: Duration,
    batch_deadline: Option<Duration>,
}

impl<A: BoardApi> SyncClient<A> {
    /// Build a client from validated settings
    pub fn new(api: A, settings: &SyncSettings) -> Self {
        Self {
            api,
            batch_sizes: settings.batch_sizes.clone(),
            call_timeout: settings.call_timeout(),
            batch_deadline: settings.batch_deadline(),
        }
    }

    /// Sync customer batches one at a time, in order.
    ///
    /// Customers share no mutable state, but sequential processing bounds
    /// blast radius and keeps remote load predictable.
    pub async fn sync_all(
        &self,
        conn: &Connection,
        batches: &[CustomerBatch],
    ) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::with_capacity(batches.len());
        for batch in batches {
            reports.push(self.sync_customer(conn, batch).await?);
        }
        Ok(reports)
    }

    /// Sync one customer batch: headers first, then the lines of every
    /// header with a confirmed external id.
    pub async fn sync_customer(
        &self,
        conn: &Connection,
        batch: &CustomerBatch,
    ) -> Result<SyncReport> {
        let store = OrderStore::new(conn);
        let start = Instant::now();
        let deadline = self.batch_deadline.map(|d| start + d);

        #[allow(clippy::cast_possible_wrap)]
        let mut record = SyncBatch {
            id: BatchId::new(),
            customer: batch.customer.clone(),
            status: BatchStatus::Running,
            headers_attempted: batch.headers.len() as i64,
            headers_synced: 0,
            headers_failed: 0,
            lines_attempted: 0,
            lines_synced: 0,
            lines_failed: 0,
            started_at: chrono::Utc::now().timestamp_millis(),
            finished_at: None,
        };
        store.create_batch(&record)?;

        let mut report = SyncReport {
            batch_id: record.id.as_str(),
            customer: batch.customer.clone(),
            headers_synced: 0,
            headers_failed: 0,
            lines_synced: 0,
            lines_failed: 0,
            errors: Vec::new(),
        };

        // Phase 1: headers. Known external ids seed the map so a re-sync
        // updates instead of creating a duplicate.
        let mut external_ids: HashMap<RecordId, String> = batch
            .headers
            .iter()
            .filter_map(|(h, _)| h.external_id.clone().map(|id| (h.record_uuid, id)))
            .collect();

        let header_muts: Vec<BoardMutation> = batch
            .headers
            .iter()
            .map(|(header, _)| {
                let fields = json!({
                    "customer": header.customer,
                    "season": header.season,
                    "content": header.content,
                });
                header.external_id.as_ref().map_or_else(
                    || BoardMutation::CreateItem {
                        record_uuid: header.record_uuid,
                        name: header.order_no.clone(),
                        fields: fields.clone(),
                    },
                    |external_id| BoardMutation::UpdateItem {
                        record_uuid: header.record_uuid,
                        external_id: external_id.clone(),
                        fields: fields.clone(),
                    },
                )
            })
            .collect();

        for (mutation, result) in self.submit_with_ladder(header_muts, deadline).await {
            let now = chrono::Utc::now().timestamp_millis();
            let record_uuid = mutation.record_uuid();
            match result {
                ItemResult::Synced { external_id } => {
                    store.mark_header_synced(record_uuid, &external_id, now)?;
                    external_ids.insert(record_uuid, external_id);
                    report.headers_synced += 1;
                }
                ItemResult::Failed { reason } => {
                    store.mark_header_failed(record_uuid, &reason, now)?;
                    external_ids.remove(&record_uuid);
                    report.errors.push(format!("{}: {reason}", mutation.describe()));
                    report.headers_failed += 1;
                }
            }
        }

        // Phase 2: lines, only under headers whose external id is now
        // confirmed. Lines of a failed parent stay PENDING untouched.
        let mut line_muts = Vec::new();
        for (header, lines) in &batch.headers {
            let Some(parent_id) = external_ids.get(&header.record_uuid) else {
                continue;
            };
            for line in lines {
                line_muts.push(line.external_id.as_ref().map_or_else(
                    || BoardMutation::CreateSubitem {
                        record_uuid: line.record_uuid,
                        size_code: line.size_code.clone(),
                        parent_external_id: parent_id.clone(),
                        name: format!("{} {}", header.order_no, line.size_code),
                        qty: line.qty,
                    },
                    |external_id| BoardMutation::UpdateSubitem {
                        record_uuid: line.record_uuid,
                        size_code: line.size_code.clone(),
                        external_id: external_id.clone(),
                        qty: line.qty,
                    },
                ));
            }
        }

        #[allow(clippy::cast_possible_wrap)]
        {
            record.lines_attempted = line_muts.len() as i64;
        }

        for (mutation, result) in self.submit_with_ladder(line_muts, deadline).await {
            let now = chrono::Utc::now().timestamp_millis();
            let record_uuid = mutation.record_uuid();
            let size_code = match &mutation {
                BoardMutation::CreateSubitem { size_code, .. }
                | BoardMutation::UpdateSubitem { size_code, .. } => size_code.clone(),
                // Header mutations never appear in the line phase
                _ => continue,
            };
            match result {
                ItemResult::Synced { external_id } => {
                    let parent_id = external_ids
                        .get(&record_uuid)
                        .cloned()
                        .unwrap_or_default();
                    store.mark_line_synced(record_uuid, &size_code, &external_id, &parent_id, now)?;
                    report.lines_synced += 1;
                }
                ItemResult::Failed { reason } => {
                    store.mark_line_failed(record_uuid, &size_code, &reason, now)?;
                    report.errors.push(format!("{}: {reason}", mutation.describe()));
                    report.lines_failed += 1;
                }
            }
        }

        #[allow(clippy::cast_possible_wrap)]
        {
            record.headers_synced = report.headers_synced as i64;
            record.headers_failed = report.headers_failed as i64;
            record.lines_synced = report.lines_synced as i64;
            record.lines_failed = report.lines_failed as i64;
        }
        let failed_any = report.headers_failed + report.lines_failed > 0;
        let synced_any = report.headers_synced + report.lines_synced > 0;
        record.status = if failed_any && !synced_any {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        record.finished_at = Some(chrono::Utc::now().timestamp_millis());
        store.finalize_batch(&record)?;

        tracing::info!(
            customer = %report.customer,
            headers_synced = report.headers_synced,
            headers_failed = report.headers_failed,
            lines_synced = report.lines_synced,
            lines_failed = report.lines_failed,
            "customer batch finished"
        );
        Ok(report)
    }

    /// Submit mutations through the shrinking-batch retry ladder.
    ///
    /// A transient failure re-queues the same logical chunk at the next
    /// smaller size; only a transient failure at the ladder floor (size 1)
    /// is attributed to that specific item. Permanent failures mark the
    /// whole chunk without descending further.
    async fn submit_with_ladder(
        &self,
        mutations: Vec<BoardMutation>,
        deadline: Option<Instant>,
    ) -> Vec<(BoardMutation, ItemResult)> {
        let first_size = self.batch_sizes.first().copied().unwrap_or(1);
        let mut results = Vec::with_capacity(mutations.len());
        let mut queue: VecDeque<(Vec<BoardMutation>, usize)> = mutations
            .chunks(first_size)
            .map(|chunk| (chunk.to_vec(), 0))
            .collect();

        while let Some((chunk, level)) = queue.pop_front() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                for mutation in chunk {
                    results.push((
                        mutation,
                        ItemResult::Failed {
                            reason: DEADLINE_REASON.to_string(),
                        },
                    ));
                }
                continue;
            }

            match self.call(&chunk).await {
                Ok(outcomes) => {
                    for (mutation, outcome) in chunk.into_iter().zip(outcomes) {
                        let result = match outcome {
                            MutationOutcome::Created { external_id }
                            | MutationOutcome::Updated { external_id } => {
                                ItemResult::Synced { external_id }
                            }
                            MutationOutcome::Rejected { reason } => ItemResult::Failed { reason },
                        };
                        results.push((mutation, result));
                    }
                }
                Err(err) if err.is_transient() && level + 1 < self.batch_sizes.len() => {
                    let next_size = self.batch_sizes[level + 1];
                    tracing::warn!(
                        error = %err,
                        from = chunk.len(),
                        to = next_size,
                        "transient remote failure, shrinking batch"
                    );
                    // Re-queue in front, in order, so siblings keep their
                    // relative submission order
                    let subs: Vec<Vec<BoardMutation>> =
                        chunk.chunks(next_size).map(<[BoardMutation]>::to_vec).collect();
                    for sub in subs.into_iter().rev() {
                        queue.push_front((sub, level + 1));
                    }
                }
                Err(err) => {
                    let reason = err.to_string();
                    tracing::warn!(error = %err, size = chunk.len(), "marking chunk failed");
                    for mutation in chunk {
                        results.push((
                            mutation,
                            ItemResult::Failed {
                                reason: reason.clone(),
                            },
                        ));
                    }
                }
            }
        }

        results
    }

    /// One remote call with a bounded timeout; an elapsed timeout counts as
    /// a transient error for the ladder.
    async fn call(
        &self,
        chunk: &[BoardMutation],
    ) -> std::result::Result<Vec<MutationOutcome>, RemoteError> {
        match tokio::time::timeout(self.call_timeout, self.api.execute(chunk)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::db::{BatchFilter, CustomerBatcher, Database, MergeEngine};
    use crate::models::SyncState;
    use crate::source::SourceRow;

    /// One scripted response; calls beyond the script succeed
    enum Step {
        Ok,
        Fail(RemoteError),
        /// Reject mutations whose name/size matches, accept the rest
        Reject(&'static str),
    }

    struct ScriptedApi {
        script: Mutex<VecDeque<Step>>,
        /// Observed chunk size per call
        calls: Mutex<Vec<usize>>,
        next_id: AtomicU64,
    }

    impl ScriptedApi {
        fn new(script: Vec<Step>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }
        }

        fn call_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }

        fn mint(&self) -> String {
            format!("E{}", self.next_id.fetch_add(1, Ordering::SeqCst))
        }

        fn succeed(&self, mutation: &BoardMutation) -> MutationOutcome {
            match mutation {
                BoardMutation::CreateItem { .. } | BoardMutation::CreateSubitem { .. } => {
                    MutationOutcome::Created {
                        external_id: self.mint(),
                    }
                }
                BoardMutation::UpdateItem { external_id, .. }
                | BoardMutation::UpdateSubitem { external_id, .. } => MutationOutcome::Updated {
                    external_id: external_id.clone(),
                },
            }
        }

        fn matches(mutation: &BoardMutation, key: &str) -> bool {
            match mutation {
                BoardMutation::CreateItem { name, .. } => name == key,
                BoardMutation::CreateSubitem { size_code, .. }
                | BoardMutation::UpdateSubitem { size_code, .. } => size_code == key,
                BoardMutation::UpdateItem { external_id, .. } => external_id == key,
            }
        }
    }

    impl BoardApi for ScriptedApi {
        async fn execute(
            &self,
            mutations: &[BoardMutation],
        ) -> std::result::Result<Vec<MutationOutcome>, RemoteError> {
            self.calls.lock().unwrap().push(mutations.len());
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok);
            match step {
                Step::Ok => Ok(mutations.iter().map(|m| self.succeed(m)).collect()),
                Step::Fail(err) => Err(err),
                Step::Reject(key) => Ok(mutations
                    .iter()
                    .map(|m| {
                        if Self::matches(m, key) {
                            MutationOutcome::Rejected {
                                reason: "invalid field value".to_string(),
                            }
                        } else {
                            self.succeed(m)
                        }
                    })
                    .collect()),
            }
        }
    }

    fn settings() -> SyncSettings {
        serde_json::from_str(
            r#"{
                "hash_columns": ["customer", "S", "M"],
                "order_column": "order_no",
                "customer_column": "customer",
                "size_start_marker": "size_start",
                "size_end_marker": "size_end",
                "call_timeout_secs": 5
            }"#,
        )
        .unwrap()
    }

    fn client(api: ScriptedApi) -> SyncClient<ScriptedApi> {
        SyncClient::new(api, &settings())
    }

    fn create_mut(name: &str) -> BoardMutation {
        BoardMutation::CreateItem {
            record_uuid: RecordId::new(),
            name: name.to_string(),
            fields: json!({}),
        }
    }

    fn row(order_no: &str, s: i64, m: i64) -> SourceRow {
        SourceRow::from_json(json!({
            "order_no": order_no,
            "customer": "ACME",
            "size_start": "",
            "S": s,
            "M": m,
            "size_end": ""
        }))
        .unwrap()
    }

    fn acme_filter() -> BatchFilter {
        BatchFilter {
            customer: Some("ACME".to_string()),
            ..BatchFilter::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transient_failure_shrinks_batch_before_failing_items() {
        let muts: Vec<BoardMutation> = (0..15).map(|i| create_mut(&format!("PO-{i}"))).collect();
        let api = ScriptedApi::new(vec![Step::Fail(RemoteError::RateLimited)]);
        let sync = client(api);

        let results = sync.submit_with_ladder(muts, None).await;

        // One failed call at 15, then three successful calls at 5
        assert_eq!(sync.api.call_sizes(), vec![15, 5, 5, 5]);
        assert!(results
            .iter()
            .all(|(_, r)| matches!(r, ItemResult::Synced { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn only_floor_level_transient_failure_is_item_attributed() {
        let muts = vec![create_mut("PO-1")];
        let api = ScriptedApi::new(vec![
            Step::Fail(RemoteError::Timeout),
            Step::Fail(RemoteError::Timeout),
            Step::Fail(RemoteError::Timeout),
        ]);
        let sync = client(api);

        let results = sync.submit_with_ladder(muts, None).await;

        // Retried at every ladder level (15 -> 5 -> 1) before giving up
        assert_eq!(sync.api.call_sizes(), vec![1, 1, 1]);
        assert_eq!(results.len(), 1);
        assert!(
            matches!(&results[0].1, ItemResult::Failed { reason } if reason.contains("timed out"))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn permanent_rejection_does_not_block_siblings() {
        let muts: Vec<BoardMutation> = (0..5).map(|i| create_mut(&format!("PO-{i}"))).collect();
        let api = ScriptedApi::new(vec![Step::Reject("PO-3")]);
        let sync = client(api);

        let results = sync.submit_with_ladder(muts, None).await;

        // A single call: the rejection consumed no sibling retry budget
        assert_eq!(sync.api.call_sizes(), vec![5]);
        let failed: Vec<&str> = results
            .iter()
            .filter(|(_, r)| matches!(r, ItemResult::Failed { .. }))
            .map(|(m, _)| match m {
                BoardMutation::CreateItem { name, .. } => name.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(failed, vec!["PO-3"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn permanent_call_error_fails_chunk_without_descending() {
        let muts: Vec<BoardMutation> = (0..5).map(|i| create_mut(&format!("PO-{i}"))).collect();
        let api = ScriptedApi::new(vec![Step::Fail(RemoteError::Api(
            401,
            "bad credentials".to_string(),
        ))]);
        let sync = client(api);

        let results = sync.submit_with_ladder(muts, None).await;

        assert_eq!(sync.api.call_sizes(), vec![5]);
        assert!(results
            .iter()
            .all(|(_, r)| matches!(r, ItemResult::Failed { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_to_end_merge_batch_sync() {
        let mut db = Database::open_in_memory().unwrap();
        let settings = settings();
        let engine = MergeEngine::new(&settings);

        // First run: PO-100 never seen before, S=10 / M=0
        engine
            .merge(db.connection_mut(), &[row("PO-100", 10, 0)])
            .unwrap();
        let batches =
            CustomerBatcher::select_pending(db.connection_mut(), &acme_filter()).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].headers[0].0.action_type, crate::models::ActionType::Insert);

        let sync = client(ScriptedApi::new(Vec::new()));
        let report = sync
            .sync_customer(db.connection(), &batches[0])
            .await
            .unwrap();
        assert_eq!(report.headers_synced, 1);
        assert_eq!(report.lines_synced, 1);
        assert!(report.errors.is_empty());

        let store = OrderStore::new(db.connection());
        let header = store.header_by_order_no("PO-100").unwrap().unwrap();
        assert_eq!(header.sync_state, SyncState::Synced);
        assert_eq!(header.external_id.as_deref(), Some("E1"));

        let lines = store.lines_for(header.record_uuid).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].sync_state, SyncState::Synced);
        assert_eq!(lines[0].external_parent_id.as_deref(), Some("E1"));

        // Second run: M changes to 7, S unchanged
        engine
            .merge(db.connection_mut(), &[row("PO-100", 10, 7)])
            .unwrap();
        let store = OrderStore::new(db.connection());
        let header = store.header_by_order_no("PO-100").unwrap().unwrap();
        assert_eq!(header.sync_state, SyncState::Pending);

        let lines = store.lines_for(header.record_uuid).unwrap();
        let s_line = lines.iter().find(|l| l.size_code == "S").unwrap();
        let m_line = lines.iter().find(|l| l.size_code == "M").unwrap();
        assert_eq!(s_line.sync_state, SyncState::Synced);
        assert_eq!(m_line.sync_state, SyncState::Pending);

        let batches =
            CustomerBatcher::select_pending(db.connection_mut(), &acme_filter()).unwrap();
        // Only the new M line is pending under the re-entered header
        assert_eq!(batches[0].headers[0].1.len(), 1);
        assert_eq!(batches[0].headers[0].1[0].size_code, "M");

        let report = sync
            .sync_customer(db.connection(), &batches[0])
            .await
            .unwrap();
        assert_eq!(report.headers_synced, 1);
        assert_eq!(report.lines_synced, 1);

        let store = OrderStore::new(db.connection());
        let header = store.header_by_order_no("PO-100").unwrap().unwrap();
        assert_eq!(header.sync_state, SyncState::Synced);
        // Updated in place, same external id
        assert_eq!(header.external_id.as_deref(), Some("E1"));

        let lines = store.lines_for(header.record_uuid).unwrap();
        let m_line = lines.iter().find(|l| l.size_code == "M").unwrap();
        assert_eq!(m_line.sync_state, SyncState::Synced);
        assert_eq!(m_line.external_parent_id.as_deref(), Some("E1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_parent_leaves_lines_pending() {
        let mut db = Database::open_in_memory().unwrap();
        let settings = settings();
        let engine = MergeEngine::new(&settings);
        engine
            .merge(db.connection_mut(), &[row("PO-100", 10, 0)])
            .unwrap();
        let batches =
            CustomerBatcher::select_pending(db.connection_mut(), &acme_filter()).unwrap();

        let sync = client(ScriptedApi::new(vec![Step::Reject("PO-100")]));
        let report = sync
            .sync_customer(db.connection(), &batches[0])
            .await
            .unwrap();
        assert_eq!(report.headers_failed, 1);
        assert_eq!(report.lines_synced, 0);
        assert_eq!(report.lines_failed, 0);

        // Only the header call went out; the line was never attempted
        assert_eq!(sync.api.call_sizes(), vec![1]);

        let store = OrderStore::new(db.connection());
        let header = store.header_by_order_no("PO-100").unwrap().unwrap();
        assert_eq!(header.sync_state, SyncState::Failed);
        assert!(header.external_id.is_none());
        assert_eq!(header.last_error.as_deref(), Some("invalid field value"));

        let lines = store.lines_for(header.record_uuid).unwrap();
        assert_eq!(lines[0].sync_state, SyncState::Pending);

        // The batch record reflects the failure
        let batch = store
            .get_batch(report.batch_id.parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_deadline_fails_remaining_items() {
        let mut db = Database::open_in_memory().unwrap();
        let mut deadline_settings = settings();
        deadline_settings.batch_deadline_secs = Some(0);

        let engine = MergeEngine::new(&deadline_settings);
        engine
            .merge(db.connection_mut(), &[row("PO-100", 10, 0)])
            .unwrap();
        let batches =
            CustomerBatcher::select_pending(db.connection_mut(), &acme_filter()).unwrap();

        let sync = SyncClient::new(ScriptedApi::new(Vec::new()), &deadline_settings);
        let report = sync
            .sync_customer(db.connection(), &batches[0])
            .await
            .unwrap();

        assert_eq!(report.headers_failed, 1);
        assert!(sync.api.call_sizes().is_empty());
        assert!(report.errors.iter().any(|e| e.contains(DEADLINE_REASON)));

        let store = OrderStore::new(db.connection());
        let header = store.header_by_order_no("PO-100").unwrap().unwrap();
        assert_eq!(header.sync_state, SyncState::Failed);
        assert_eq!(header.last_error.as_deref(), Some(DEADLINE_REASON));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_all_processes_customers_sequentially() {
        let mut db = Database::open_in_memory().unwrap();
        let settings = settings();
        let engine = MergeEngine::new(&settings);

        let globex = SourceRow::from_json(json!({
            "order_no": "PO-200",
            "customer": "GLOBEX",
            "size_start": "",
            "S": 2,
            "M": 0,
            "size_end": ""
        }))
        .unwrap();
        engine
            .merge(db.connection_mut(), &[row("PO-100", 10, 0), globex])
            .unwrap();

        let filter = BatchFilter {
            season: None,
            order_no: None,
            customer: None,
        };
        assert!(CustomerBatcher::select_pending(db.connection_mut(), &filter).is_err());

        let mut all = Vec::new();
        for customer in ["ACME", "GLOBEX"] {
            let filter = BatchFilter {
                customer: Some(customer.to_string()),
                ..BatchFilter::default()
            };
            all.extend(CustomerBatcher::select_pending(db.connection_mut(), &filter).unwrap());
        }

        let sync = client(ScriptedApi::new(Vec::new()));
        let reports = sync.sync_all(db.connection(), &all).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.headers_failed == 0));
    }
}
