//! Domain models shared across the merge engine, batcher, and sync client

mod batch;
mod header;
mod line;
mod state;

pub use batch::{BatchId, BatchStatus, CustomerBatch, SyncBatch};
pub use header::{OrderHeader, RecordId};
pub use line::{LineTuple, OrderLine};
pub use state::{ActionType, SyncState};
