use crate::error::{ErrorKind, Result};
use crate::record::{Classification, Detection, Failure};
use std::collections::HashSet;

/// The terminal fields written onto a [`ScanRecord`](crate::ScanRecord) when
/// it leaves [`Pending`](Classification::Pending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub classification: Classification,
    pub malicious_count: u32,
    /// The oracle only reports found/not-found per engine, so nothing in this
    /// workspace ever produces a non-zero value. Kept for the record shape.
    pub suspicious_count: u32,
    pub detections: Vec<Detection>,
    pub failure: Option<Failure>,
    pub failure_message: Option<String>,
}
impl Verdict {
    /// A clean scan.
    pub fn safe() -> Self {
        Self {
            classification: Classification::Safe,
            malicious_count: 0,
            suspicious_count: 0,
            detections: Vec::new(),
            failure: None,
            failure_message: None,
        }
    }

    /// A scan that could not produce a verdict.
    pub fn failed(failure: Failure, message: Option<String>) -> Self {
        Self {
            classification: Classification::Error,
            failure: Some(failure),
            failure_message: message,
            ..Self::safe()
        }
    }

    /// Checks the record invariants this verdict must satisfy before it can
    /// be written.
    ///
    /// # Examples
    ///
    /// ```
    /// use sift_model::{Classification, Detection, Verdict};
    ///
    /// let verdict = Verdict {
    ///     classification: Classification::Malicious,
    ///     malicious_count: 1,
    ///     detections: vec![Detection::new("EngineB", "Trojan.X")],
    ///     ..Verdict::safe()
    /// };
    /// assert!(verdict.validate().is_ok());
    /// // Malicious without a malicious count is not.
    /// assert!(Verdict { malicious_count: 0, ..verdict }.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if !self.classification.is_terminal() {
            exn::bail!(ErrorKind::Invariant("a verdict must be terminal"));
        }
        if (self.classification == Classification::Malicious) != (self.malicious_count > 0) {
            exn::bail!(ErrorKind::Invariant("malicious classification must match a non-zero malicious count"));
        }
        if self.classification != Classification::Malicious && !self.detections.is_empty() {
            exn::bail!(ErrorKind::Invariant("only malicious verdicts carry detections"));
        }
        let counted = u64::from(self.malicious_count) + u64::from(self.suspicious_count);
        if u64::try_from(self.detections.len()).unwrap_or(u64::MAX) > counted {
            exn::bail!(ErrorKind::Invariant("more detections than malicious and suspicious engines"));
        }
        let mut engines = HashSet::with_capacity(self.detections.len());
        if !self.detections.iter().all(|d| engines.insert(d.engine.as_str())) {
            exn::bail!(ErrorKind::Invariant("an engine appears more than once in detections"));
        }
        if (self.classification == Classification::Error) != self.failure.is_some() {
            exn::bail!(ErrorKind::Invariant("a failure marker is set exactly when the verdict is an error"));
        }
        Ok(())
    }
}
