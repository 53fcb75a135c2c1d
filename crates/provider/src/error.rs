//! Provider Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A provider error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The oracle could not be reached, timed out, or is overloaded. Retrying
    /// the whole submission later may succeed.
    #[display("scan provider unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// The oracle refused the payload or answered with something that is not
    /// a usable response. Retrying with the same input will not help.
    #[display("scan provider rejected the request: {_0}")]
    Rejected(#[error(not(source))] String),
    /// The client could not be constructed from its configuration.
    #[display("invalid provider configuration: {_0}")]
    Configuration(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
