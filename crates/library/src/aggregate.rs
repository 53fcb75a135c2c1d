use sift_model::{Classification, Detection, ScanOutcome, Verdict};
use std::collections::HashSet;

/// Reduce an oracle's per-engine findings to a verdict.
///
/// An engine counts as a detection when its threat label is non-empty. The
/// first report for an engine wins; repeats are ignored so no engine is
/// counted twice. Detections keep the oracle's engine order.
///
/// The oracle only distinguishes found from not-found, so the suspicious
/// count is always zero.
///
/// # Examples
///
/// ```
/// use sift_library::aggregate;
/// use sift_model::{Classification, Detection, ScanOutcome};
///
/// let outcome = ScanOutcome::from_iter([("EngineA", ""), ("EngineB", "Trojan.X")]);
/// let verdict = aggregate(&outcome);
/// assert_eq!(verdict.classification, Classification::Malicious);
/// assert_eq!(verdict.malicious_count, 1);
/// assert_eq!(verdict.detections, vec![Detection::new("EngineB", "Trojan.X")]);
/// ```
pub fn aggregate(outcome: &ScanOutcome) -> Verdict {
    let mut engines = HashSet::with_capacity(outcome.len());
    let detections: Vec<Detection> = outcome
        .findings()
        .iter()
        .filter(|finding| engines.insert(finding.engine.as_str()))
        .filter(|finding| finding.is_threat())
        .map(|finding| Detection::new(finding.engine.as_str(), finding.threat.as_str()))
        .collect();
    if detections.is_empty() {
        return Verdict::safe();
    }
    Verdict {
        classification: Classification::Malicious,
        // Cannot overflow: there are never more than a few dozen engines.
        malicious_count: u32::try_from(detections.len()).unwrap_or(u32::MAX),
        detections,
        ..Verdict::safe()
    }
}
