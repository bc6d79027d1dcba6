//! Database layer: connection management, migrations, row storage, the
//! change-detection merge engine, and the customer batcher

mod batcher;
mod connection;
mod merge;
pub mod migrations;
mod repository;

pub use batcher::{BatchFilter, CustomerBatcher};
pub use connection::Database;
pub use merge::{MergeEngine, MergeReport};
pub use repository::OrderStore;
