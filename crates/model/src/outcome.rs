/// A single engine's report for a scanned file.
///
/// The oracle reports an empty threat label for engines that found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFinding {
    pub engine: String,
    pub threat: String,
}
impl EngineFinding {
    pub fn new(engine: impl Into<String>, threat: impl Into<String>) -> Self {
        Self { engine: engine.into(), threat: threat.into() }
    }

    /// Whether this engine reported a threat.
    ///
    /// Whitespace-only labels name nothing, so they count as clean.
    pub fn is_threat(&self) -> bool {
        !self.threat.trim().is_empty()
    }
}

/// Terminal result of a scan: every engine's finding, in the order the oracle
/// reported them.
///
/// # Examples
///
/// ```
/// use sift_model::ScanOutcome;
///
/// let outcome = ScanOutcome::from_iter([("EngineA", ""), ("EngineB", "Trojan.X")]);
/// assert_eq!(outcome.len(), 2);
/// assert_eq!(outcome.threats().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    findings: Vec<EngineFinding>,
}
impl ScanOutcome {
    pub fn new(findings: Vec<EngineFinding>) -> Self {
        Self { findings }
    }

    pub fn findings(&self) -> &[EngineFinding] {
        &self.findings
    }

    /// Findings that carry a threat label, in reported order.
    pub fn threats(&self) -> impl Iterator<Item = &EngineFinding> {
        self.findings.iter().filter(|f| f.is_threat())
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}
impl<E: Into<String>, T: Into<String>> FromIterator<(E, T)> for ScanOutcome {
    fn from_iter<I: IntoIterator<Item = (E, T)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(engine, threat)| EngineFinding::new(engine, threat)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", false)]
    #[case("   ", false)]
    #[case("\t\n", false)]
    #[case("Trojan.X", true)]
    #[case(" EICAR-Test-File ", true)]
    fn test_is_threat(#[case] threat: &str, #[case] expected: bool) {
        assert_eq!(EngineFinding::new("Engine", threat).is_threat(), expected);
    }

    #[test]
    fn test_order_is_preserved() {
        let outcome = ScanOutcome::from_iter([("Zeta", "A"), ("Alpha", ""), ("Mu", "B")]);
        let engines: Vec<_> = outcome.threats().map(|f| f.engine.as_str()).collect();
        assert_eq!(engines, ["Zeta", "Mu"]);
    }
}
