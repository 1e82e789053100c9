use super::finding::{Finding, Severity};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Number of checks that were eligible and executed, not the number of
    /// findings.
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    /// Findings carrying at least one fix, after severity filtering.
    pub fixable: usize,
}

/// Complete output of one scan. Findings keep check-registration order;
/// sorting for display is a presentation concern.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub summary: ReportSummary,
}

impl Report {
    pub(crate) fn assemble(
        findings: Vec<Finding>,
        total: usize,
        min_severity: Option<Severity>,
    ) -> Self {
        let findings: Vec<Finding> = findings
            .into_iter()
            .filter(|finding| min_severity.is_none_or(|min| finding.severity >= min))
            .collect();

        let count = |severity: Severity| {
            findings
                .iter()
                .filter(|finding| finding.severity == severity)
                .count()
        };

        let summary = ReportSummary {
            total,
            errors: count(Severity::Error),
            warnings: count(Severity::Warning),
            info: count(Severity::Info),
            fixable: findings.iter().filter(|f| f.is_fixable()).count(),
        };

        Self { findings, summary }
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }
}
