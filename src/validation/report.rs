//! Validation report shapes shared by the integrity checker and the
//! migration readiness checks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one check domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Informational lines (counts, context) that affect neither validity
    /// nor warnings.
    #[serde(default)]
    pub notes: Vec<String>,
}

impl CheckReport {
    pub fn passing() -> Self {
        Self { valid: true, errors: Vec::new(), warnings: Vec::new(), notes: Vec::new() }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.valid = false;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }
}

/// Aggregate over all five integrity domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub overall_valid: bool,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub checks: BTreeMap<String, CheckReport>,
}

impl IntegrityReport {
    pub fn from_checks(checks: BTreeMap<String, CheckReport>) -> Self {
        let overall_valid = checks.values().all(|c| c.valid);
        let total_errors = checks.values().map(|c| c.errors.len()).sum();
        let total_warnings = checks.values().map(|c| c.warnings.len()).sum();
        Self { overall_valid, total_errors, total_warnings, checks }
    }
}

/// Log of actions taken by the best-effort repair pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixReport {
    pub actions: Vec<String>,
}

impl FixReport {
    pub fn record(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    pub fn fixed_count(&self) -> usize {
        self.actions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_counts_and_validity() {
        let mut bad = CheckReport::passing();
        bad.error("broken");
        bad.warn("dubious");
        let good = CheckReport::passing();

        let mut checks = BTreeMap::new();
        checks.insert("a".to_string(), bad);
        checks.insert("b".to_string(), good);
        let report = IntegrityReport::from_checks(checks);

        assert!(!report.overall_valid);
        assert_eq!(report.total_errors, 1);
        assert_eq!(report.total_warnings, 1);
    }
}
