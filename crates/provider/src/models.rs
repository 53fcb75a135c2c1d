//! Provider models.
//!
//! What the oracle hands back between submission and completion.

use sift_model::ScanOutcome;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Opaque reference to a submitted file at the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionHandle(String);
impl SubmissionHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for SubmissionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The oracle is still working; carries the last reported percentage (if
    /// the oracle reported one).
    InProgress(Option<u8>),
    /// The oracle reported 100% progress.
    Complete(ScanOutcome),
}
impl Progress {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}
