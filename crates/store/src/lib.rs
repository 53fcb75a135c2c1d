//! SQLite store for scan records.
//!
//! One row per accepted upload. A row is inserted `pending` (or directly in a
//! terminal state when the submission never reached the oracle) and then
//! completed exactly once. Completed rows are immutable: the conditional
//! update in [`Repository::complete`](ScanStore::complete) only matches
//! pending rows, and a trigger aborts any other attempt to change them.

mod db;
pub mod error;
mod models;
mod repo;
mod store;

pub use crate::db::Database;
pub use crate::repo::Repository;
pub use crate::store::{ScanStore, StoreHandle};
