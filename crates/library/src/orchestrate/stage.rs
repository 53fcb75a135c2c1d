use derive_more::Display;
use sift_model::RecordId;

/// Where a single submission is in its life.
///
/// ```text
/// Received -> Submitting -> Polling -> Aggregating -> Persisted
///                 |            |            |
///                 v            v            v
///          SubmissionFailed  TimedOut  PersistenceFailed
/// ```
///
/// A poll that fails outright (the oracle went away, or forgot the handle)
/// ends in `SubmissionFailed` as well: the record is completed as an error
/// either way.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    #[display("received")]
    Received,
    #[display("submitting")]
    Submitting,
    #[display("polling")]
    Polling,
    #[display("aggregating")]
    Aggregating,
    #[display("persisted")]
    Persisted,
    #[display("submission failed")]
    SubmissionFailed,
    #[display("timed out")]
    TimedOut,
    #[display("persistence failed")]
    PersistenceFailed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        self.is_failure() || *self == Self::Persisted
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::SubmissionFailed | Self::TimedOut | Self::PersistenceFailed)
    }

    /// Log the transition into this stage.
    pub(crate) fn enter(self, record: Option<RecordId>) {
        let record = record.map(|id| id.get());
        if self.is_failure() {
            tracing::warn!(stage = %self, record, "Scan failed");
        } else if self == Self::Persisted {
            tracing::info!(stage = %self, record, "Scan recorded");
        } else {
            tracing::debug!(stage = %self, record, "Scan advanced");
        }
    }
}
