//! Durable sync artifacts.
//!
//! State between pipeline invocations lives entirely in these documents so
//! each stage can run in its own request. SyncData gates Stage 2, the
//! Manifest gates Stage 3, and each is individually deletable by an
//! operator to force the corresponding stage to run again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::constants::MAX_STAGE_ERRORS;
use super::gallery::CategoryTree;

/// The kinds of artifact the store manages, one document each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    SyncData,
    Manifest,
    Stage3Summary,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::SyncData => "sync_data.json",
            Self::Manifest => "manifest.json",
            Self::Stage3Summary => "stage3_summary.json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sync_data" => Some(Self::SyncData),
            "manifest" => Some(Self::Manifest),
            "stage3_summary" => Some(Self::Stage3Summary),
            _ => None,
        }
    }
}

/// Stage 1 output: raw category/procedure snapshot plus timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncData {
    pub generated_at: DateTime<Utc>,
    pub tree: CategoryTree,
}

/// Stage 2 output: procedure → case-id index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    /// Keyed by remote procedure id. BTreeMap keeps iteration order stable
    /// across runs, which keeps Stage 3 batching deterministic.
    pub entries: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub procedure_name: String,
    pub case_count: u64,
    pub case_ids: Vec<String>,
}

impl Manifest {
    pub fn total_cases(&self) -> u64 {
        self.entries.values().map(|e| e.case_count).sum()
    }

    /// Distinct case ids across all procedures, each paired with every
    /// procedure id it appears under. A case shared by several procedures
    /// is materialized once and labeled with all of them.
    pub fn distinct_cases(&self) -> BTreeMap<String, Vec<String>> {
        let mut cases: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (procedure_id, entry) in &self.entries {
            for case_id in &entry.case_ids {
                cases.entry(case_id.clone()).or_default().push(procedure_id.clone());
            }
        }
        cases
    }
}

/// Stage 3 output: counts plus the capped per-case error list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage3Summary {
    pub completed_at: DateTime<Utc>,
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
    pub processed: u64,
    pub total: u64,
    pub errors: Vec<String>,
    /// Errors dropped once `errors` reached its cap.
    #[serde(default)]
    pub suppressed_errors: u64,
}

impl Stage3Summary {
    /// Push an error, honoring the cap. Returns true when recorded verbatim.
    pub fn record_error(&mut self, message: String) -> bool {
        if self.errors.len() < MAX_STAGE_ERRORS {
            self.errors.push(message);
            true
        } else {
            self.suppressed_errors += 1;
            false
        }
    }

    /// Error lines for display, ending with an "…and N more" summary when
    /// the cap was exceeded.
    pub fn error_lines(&self) -> Vec<String> {
        let mut lines = self.errors.clone();
        if self.suppressed_errors > 0 {
            lines.push(format!("...and {} more", self.suppressed_errors));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sync_data", ArtifactKind::SyncData)]
    #[case("manifest", ArtifactKind::Manifest)]
    #[case("stage3_summary", ArtifactKind::Stage3Summary)]
    fn artifact_kind_parses_wire_names(#[case] input: &str, #[case] expected: ArtifactKind) {
        assert_eq!(ArtifactKind::parse(input), Some(expected));
        assert_eq!(ArtifactKind::parse("bogus"), None);
    }

    #[test]
    fn distinct_cases_merges_shared_ids() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "p1".to_string(),
            ManifestEntry {
                procedure_name: "Facelift".into(),
                case_count: 2,
                case_ids: vec!["a".into(), "b".into()],
            },
        );
        entries.insert(
            "p2".to_string(),
            ManifestEntry {
                procedure_name: "Neck Lift".into(),
                case_count: 1,
                case_ids: vec!["b".into()],
            },
        );
        let manifest = Manifest { generated_at: Utc::now(), entries };
        let cases = manifest.distinct_cases();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases["b"], vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(manifest.total_cases(), 3);
    }

    #[test]
    fn stage3_error_cap_suppresses_overflow() {
        let mut summary = Stage3Summary {
            completed_at: Utc::now(),
            created: 0,
            updated: 0,
            failed: 0,
            processed: 0,
            total: 0,
            errors: Vec::new(),
            suppressed_errors: 0,
        };
        for i in 0..(MAX_STAGE_ERRORS + 5) {
            summary.record_error(format!("case {i} failed"));
        }
        assert_eq!(summary.errors.len(), MAX_STAGE_ERRORS);
        assert_eq!(summary.suppressed_errors, 5);
        let lines = summary.error_lines();
        assert_eq!(lines.last().unwrap(), "...and 5 more");
    }
}
