//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Provider and store errors are kept
//! as children in the error tree.

use derive_more::{Display, Error};
use sift_model::RecordId;
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How a submission (or a record lookup) failed.
///
/// Every variant that comes after the submission reached the oracle names the
/// record that now documents the failure, when one could be written.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upload was refused before anything was sent or recorded.
    #[display("invalid upload: {_0}")]
    InvalidUpload(#[error(not(source))] String),
    #[display("could not read {}", _0.display())]
    Unreadable(#[error(not(source))] PathBuf),
    /// The oracle could not be reached. Submitting the file again later may
    /// succeed.
    #[display("scan provider unavailable")]
    ProviderUnavailable { recorded: Option<RecordId> },
    /// The oracle refused the file or its handle. Resubmitting the same file
    /// will not help.
    #[display("scan provider rejected the file")]
    ProviderRejected { recorded: Option<RecordId> },
    /// Polling ran out of attempts. The record is marked as timed out, which
    /// says nothing about whether the file is clean.
    #[display("scan did not finish in time (record {record})")]
    ScanTimeout { record: RecordId },
    /// The verdict could not be written to an existing record.
    #[display("could not persist the verdict for record {record}")]
    Persistence { record: RecordId },
    #[display("scan record not found: {_0}")]
    RecordNotFound(#[error(not(source))] RecordId),
    /// The store failed before a record existed.
    #[display("scan store error")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. } | Self::Store)
    }

    /// The record written for this failure, if any.
    pub fn record(&self) -> Option<RecordId> {
        match self {
            Self::ProviderUnavailable { recorded } | Self::ProviderRejected { recorded } => *recorded,
            Self::ScanTimeout { record } | Self::Persistence { record } => Some(*record),
            Self::InvalidUpload(_) | Self::Unreadable(_) | Self::RecordNotFound(_) | Self::Store => None,
        }
    }
}
