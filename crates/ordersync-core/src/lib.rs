//! ordersync-core - Core library for OrderSync
//!
//! This crate contains the source-row model, hash-based change detection,
//! size-column unpivoting, the staging-to-main merge engine, the customer
//! batcher, and the external sync client used by the CLI.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod models;
pub mod source;
pub mod unpivot;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use models::{OrderHeader, OrderLine, RecordId, SyncState};
