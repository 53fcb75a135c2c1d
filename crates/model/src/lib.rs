//! Data model shared by the provider client, the record store and the
//! orchestrator.
//!
//! - [`ScanOutcome`] is what the scanning oracle reports once a scan reaches
//!   100% progress: an ordered list of per-engine findings.
//! - [`Verdict`] is the terminal state written onto a record exactly once.
//! - [`ScanRecord`] is the persisted, one-per-upload record.

pub mod error;
mod outcome;
mod record;
mod verdict;

pub use crate::outcome::{EngineFinding, ScanOutcome};
pub use crate::record::{Classification, Detection, Failure, NewScan, RecordId, ScanRecord};
pub use crate::verdict::Verdict;
