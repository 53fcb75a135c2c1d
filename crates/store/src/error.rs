//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use sift_model::RecordId;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database could not be reached or the statement failed to run.
    #[display("scan store unavailable")]
    Unavailable,
    #[display("database migration error")]
    Migration,
    #[display("scan record not found: {_0}")]
    RecordNotFound(#[error(not(source))] RecordId),
    /// The record already carries a terminal verdict, which is never overwritten.
    #[display("scan record already completed: {_0}")]
    AlreadyCompleted(#[error(not(source))] RecordId),
    /// The write would break a record invariant.
    #[display("scan record constraint violated: {_0}")]
    Constraint(#[error(not(source))] &'static str),
    /// A stored value could not be converted to or from its model type.
    #[display("invalid scan record data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}
