use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;

/// Opaque identifier of a [`ScanRecord`], assigned by the store on creation.
///
/// Identifiers are never reused for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(i64);
impl RecordId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}
impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
impl FromStr for RecordId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => exn::bail!(ErrorKind::ParseError { field: "record id", value: s.to_string() }),
        }
    }
}
impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Where a scan record stands.
///
/// [`Pending`](Self::Pending) is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Classification {
    #[default]
    Pending,
    /// Every engine came back clean.
    Safe,
    /// At least one engine reported a threat.
    Malicious,
    /// The scan could not produce a verdict. See [`Failure`] for why.
    Error,
}
impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Pending => "pending",
            Classification::Safe => "safe",
            Classification::Malicious => "malicious",
            Classification::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Classification::Pending)
    }
}
impl FromStr for Classification {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "safe" | "clean" => Self::Safe,
            "malicious" => Self::Malicious,
            "error" => Self::Error,
            _ => exn::bail!(ErrorKind::ParseError { field: "classification", value: s.to_string() }),
        })
    }
}
impl Display for Classification {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Why a record ended up classified as [`Classification::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    /// Polling exhausted its attempt budget before the oracle finished.
    /// Says nothing about whether the file is clean.
    Timeout,
    /// The oracle refused the payload or the submission handle.
    Rejected,
    /// The oracle could not be reached.
    Unavailable,
}
impl Failure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Failure::Timeout => "timeout",
            Failure::Rejected => "rejected",
            Failure::Unavailable => "unavailable",
        }
    }
}
impl FromStr for Failure {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "timeout" => Self::Timeout,
            "rejected" => Self::Rejected,
            "unavailable" => Self::Unavailable,
            _ => exn::bail!(ErrorKind::ParseError { field: "failure", value: s.to_string() }),
        })
    }
}
impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// An engine that reported a threat, and the threat's label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Detection {
    pub engine: String,
    pub threat: String,
}
impl Detection {
    pub fn new(engine: impl Into<String>, threat: impl Into<String>) -> Self {
        Self { engine: engine.into(), threat: threat.into() }
    }
}

/// Everything known about an upload at the moment it is accepted.
///
/// The store turns this into a [`Pending`](Classification::Pending)
/// [`ScanRecord`], or straight into a terminal one when the submission never
/// reached the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    pub stored_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// BLAKE3 digest of the uploaded bytes (hex).
    pub content_hash: String,
    pub owner_id: Option<String>,
    /// Handle returned by the oracle; absent when submission failed.
    pub provider_handle: Option<String>,
}
impl NewScan {
    pub fn with_provider_handle(mut self, handle: impl Into<String>) -> Self {
        self.provider_handle = Some(handle.into());
        self
    }
}

/// One persisted record per accepted upload.
///
/// Write-once: once [`completed_at`](Self::completed_at) is set, the
/// classification, counts, detections and failure marker never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub id: RecordId,
    pub stored_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub owner_id: Option<String>,
    pub provider_handle: Option<String>,
    pub classification: Classification,
    pub malicious_count: u32,
    pub suspicious_count: u32,
    pub detections: Vec<Detection>,
    pub failure: Option<Failure>,
    pub failure_message: Option<String>,
    pub submitted_at: UtcDateTime,
    pub completed_at: Option<UtcDateTime>,
}
impl ScanRecord {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_timed_out(&self) -> bool {
        self.failure == Some(Failure::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pending", Classification::Pending)]
    #[case("Safe", Classification::Safe)]
    #[case("clean", Classification::Safe)]
    #[case(" MALICIOUS ", Classification::Malicious)]
    #[case("error", Classification::Error)]
    fn test_parse_classification(#[case] input: &str, #[case] expected: Classification) {
        assert_eq!(input.parse::<Classification>().unwrap(), expected);
    }

    #[test]
    fn test_parse_classification_unknown() {
        let err = "infected".parse::<Classification>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "classification", .. }));
    }

    #[test]
    fn test_only_pending_is_not_terminal() {
        assert!(!Classification::Pending.is_terminal());
        assert!(Classification::Safe.is_terminal());
        assert!(Classification::Malicious.is_terminal());
        assert!(Classification::Error.is_terminal());
    }

    #[rstest]
    #[case("42", Some(42))]
    #[case(" 7 ", Some(7))]
    #[case("0", None)]
    #[case("-3", None)]
    #[case("abc", None)]
    fn test_parse_record_id(#[case] input: &str, #[case] expected: Option<i64>) {
        assert_eq!(input.parse::<RecordId>().ok().map(|id| id.get()), expected);
    }

    #[test]
    fn test_failure_display_matches_parse() {
        for failure in [Failure::Timeout, Failure::Rejected, Failure::Unavailable] {
            assert_eq!(failure.to_string().parse::<Failure>().unwrap(), failure);
        }
    }
}
