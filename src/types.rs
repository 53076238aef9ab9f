//! Forge - Type Definitions
//!
//! All shared types for the self-repair governor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ─── Audit ───────────────────────────────────────────────────────

/// Who performed a governance action.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// The repair pipeline itself.
    Governor,
    /// The policy engine.
    Warden,
    /// The test gate.
    Gate,
    /// A human at the CLI (freeze/thaw/snapshot).
    Operator,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Governor => "governor",
            Actor::Warden => "warden",
            Actor::Gate => "gate",
            Actor::Operator => "operator",
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row in the append-only audit log. Never mutated, never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: String,
    pub actor: Actor,
    pub action: String,
    pub detail: String,
}

// ─── Snapshots ───────────────────────────────────────────────────

/// Index record for one immutable workspace snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub timestamp: String,
    pub label: String,
    /// Absolute path of the zip archive.
    pub path: String,
    /// Relative paths included in the archive, in walk order.
    pub manifest: Vec<String>,
}

// ─── Proposals ───────────────────────────────────────────────────

/// A candidate replacement for a target artifact's content.
///
/// A proposal identical to the current content is a valid no-op and still
/// flows through the full pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeProposal {
    /// Target artifact, relative to the workspace root.
    pub target: PathBuf,
    /// Proposed full replacement content.
    pub content: String,
    /// Name of the strategy that produced this proposal.
    pub strategy: String,
}

// ─── Test gate ───────────────────────────────────────────────────

/// Verdict for a single verification unit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitVerdict {
    Passed,
    Failed,
    /// The unit raised a runtime fault; the message is captured, never
    /// propagated.
    Error(String),
}

/// Outcome of one verification unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOutcome {
    pub name: String,
    pub verdict: UnitVerdict,
}

/// Aggregate result of one gate run. Computed fresh every attempt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub units: Vec<UnitOutcome>,
}

impl TestReport {
    /// Logical AND of all unit verdicts. An empty set is vacuously green.
    pub fn all_green(&self) -> bool {
        self.units
            .iter()
            .all(|u| u.verdict == UnitVerdict::Passed)
    }

    /// Names of every unit that did not pass.
    pub fn failing(&self) -> Vec<String> {
        self.units
            .iter()
            .filter(|u| u.verdict != UnitVerdict::Passed)
            .map(|u| u.name.clone())
            .collect()
    }
}

// ─── Repair outcomes ─────────────────────────────────────────────

/// Terminal state of one repair attempt.
///
/// The exit codes are a public contract for callers and must stay stable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The proposal was committed to the live workspace.
    Applied { added_lines: usize, pct: u32 },
    /// The freeze flag is set; nothing was attempted.
    Frozen,
    /// Content matched one or more banned patterns.
    Blocked { patterns: Vec<String> },
    /// Change size exceeded the plain budget without escalation.
    BudgetExceeded { pct: u32, budget: u32 },
    /// The gate was red and green tests are required.
    TestsFailed { failing: Vec<String> },
    /// A human acknowledgment artifact is required and absent.
    EscalationRequired {
        strategy: String,
        pct: u32,
        threshold: u32,
        require: String,
    },
}

impl RepairOutcome {
    /// Stable exit code for the `repair` command.
    pub fn exit_code(&self) -> i32 {
        match self {
            RepairOutcome::Applied { .. } => 0,
            RepairOutcome::Frozen => 1,
            RepairOutcome::Blocked { .. } => 2,
            RepairOutcome::BudgetExceeded { .. } => 3,
            RepairOutcome::TestsFailed { .. } => 4,
            RepairOutcome::EscalationRequired { .. } => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(
            RepairOutcome::Applied { added_lines: 0, pct: 0 }.exit_code(),
            0
        );
        assert_eq!(RepairOutcome::Frozen.exit_code(), 1);
        assert_eq!(RepairOutcome::Blocked { patterns: vec![] }.exit_code(), 2);
        assert_eq!(
            RepairOutcome::BudgetExceeded { pct: 9, budget: 5 }.exit_code(),
            3
        );
        assert_eq!(
            RepairOutcome::TestsFailed { failing: vec![] }.exit_code(),
            4
        );
        assert_eq!(
            RepairOutcome::EscalationRequired {
                strategy: "regen".into(),
                pct: 0,
                threshold: 5,
                require: "human-ack.txt".into(),
            }
            .exit_code(),
            5
        );
    }

    #[test]
    fn test_empty_report_is_vacuously_green() {
        let report = TestReport::default();
        assert!(report.all_green());
        assert!(report.failing().is_empty());
    }

    #[test]
    fn test_error_verdict_counts_as_not_green() {
        let report = TestReport {
            units: vec![
                UnitOutcome {
                    name: "test_a".into(),
                    verdict: UnitVerdict::Passed,
                },
                UnitOutcome {
                    name: "test_b".into(),
                    verdict: UnitVerdict::Error("boom".into()),
                },
            ],
        };
        assert!(!report.all_green());
        assert_eq!(report.failing(), vec!["test_b".to_string()]);
    }
}
