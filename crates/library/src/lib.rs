//! Scan orchestration.
//!
//! Takes an accepted upload through submission to the scanning oracle, a
//! bounded poll loop, verdict aggregation and a single write-once record.
//! The entry point is [`Orchestrator::submit_and_record`]; [`Orchestrator::scan_batch`]
//! runs many of those concurrently and streams their results, and
//! [`Orchestrator::scan_files`] does the same for files read from disk on demand.

mod aggregate;
pub mod error;
mod orchestrate;
mod records;
mod upload;

pub use crate::aggregate::aggregate;
pub use crate::orchestrate::{BatchEvent, Orchestrator, PollPolicy, Stage};
pub use crate::records::Records;
pub use crate::upload::{Upload, UploadFile, UploadPolicy, stored_name};
