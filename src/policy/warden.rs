//! Warden Evaluation
//!
//! Given a change proposal and the loaded policy, produce a verdict.
//! Ordering is mandatory: content scan first (content safety is never
//! waived by budget or escalation), then the escalation gate, then the
//! plain budget check.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use crate::policy::PolicyConfig;
use crate::types::ChangeProposal;

/// Always-on safety rails appended to whatever the policy file carries.
/// Editing configuration alone cannot remove these: dynamic code
/// evaluation and raw network-socket primitives stay banned.
pub const BUILTIN_BANNED: &[&str] = &[
    r"\beval\s*\(",
    r"\bexec\s*\(",
    r"\b(TcpStream|TcpListener|UdpSocket)\b",
];

/// Policy verdict for one proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Every matched pattern, not just the first.
    Blocked { patterns: Vec<String> },
    /// Acknowledgment artifact required and absent.
    EscalationRequired {
        strategy: String,
        pct: u32,
        threshold: u32,
        require: String,
    },
    BudgetExceeded { pct: u32, budget: u32 },
}

/// Change size of `proposed` relative to `original`.
///
/// Returns `(pct, added_lines)`: the count of non-blank lines present in
/// the proposal but absent verbatim from the original's line set, over the
/// original's line count (minimum denominator 1), floored and capped at
/// 100. A line that merely moved position does not count as added.
pub fn change_delta(original: &str, proposed: &str) -> (u32, usize) {
    let original_lines: HashSet<&str> = original.lines().collect();
    let added = proposed
        .lines()
        .filter(|line| !line.trim().is_empty() && !original_lines.contains(line))
        .count();
    let base = original.lines().count().max(1);
    let pct = ((added * 100) / base).min(100) as u32;
    (pct, added)
}

/// Evaluate `proposal` against `policy`.
///
/// `original` is the current content of the target artifact (empty if it
/// does not exist yet); `workspace_root` is where the acknowledgment
/// artifact is looked up.
pub fn evaluate(
    proposal: &ChangeProposal,
    original: &str,
    policy: &PolicyConfig,
    workspace_root: &Path,
) -> Verdict {
    // 1. Content scan over the full proposed content.
    let hits = scan_content(&proposal.content, policy);
    if !hits.is_empty() {
        return Verdict::Blocked { patterns: hits };
    }

    let (pct, added) = change_delta(original, &proposal.content);
    debug!(pct, added, strategy = %proposal.strategy, "change delta computed");

    // 2. Escalation gate, evaluated before the hard budget rejection.
    let triggered = policy
        .trigger_strategies
        .iter()
        .any(|s| s == &proposal.strategy);
    let need_ack = triggered || pct > policy.max_budget_pct_without_ack;

    if need_ack {
        let ack = workspace_root.join(&policy.ack_file);
        if !ack.exists() {
            return Verdict::EscalationRequired {
                strategy: proposal.strategy.clone(),
                pct,
                threshold: policy.max_budget_pct_without_ack,
                require: policy.ack_file.clone(),
            };
        }
        // Acknowledged: allowed notwithstanding the hard budget.
        return Verdict::Allowed;
    }

    // 3. Plain budget. Boundary is inclusive: pct == budget is allowed.
    if pct > policy.change_budget_pct {
        return Verdict::BudgetExceeded {
            pct,
            budget: policy.change_budget_pct,
        };
    }

    Verdict::Allowed
}

/// Match every configured and builtin banned pattern against `content`.
///
/// Patterns that fail to compile are skipped with a warning; a broken
/// policy rule must never read as an allow of unsafe content, so the
/// remaining rules still run.
fn scan_content(content: &str, policy: &PolicyConfig) -> Vec<String> {
    let mut hits = Vec::new();
    let all = policy
        .banned_patterns
        .iter()
        .map(String::as_str)
        .chain(BUILTIN_BANNED.iter().copied());

    for pattern in all {
        match Regex::new(pattern) {
            Ok(re) => {
                if re.is_match(content) {
                    hits.push(pattern.to_string());
                }
            }
            Err(e) => {
                warn!(pattern, error = %e, "skipping invalid regex from policy");
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn proposal(strategy: &str, content: &str) -> ChangeProposal {
        ChangeProposal {
            target: PathBuf::from("core/registry.rs"),
            content: content.to_string(),
            strategy: strategy.to_string(),
        }
    }

    fn lines(n: usize) -> String {
        (0..n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_builtin_patterns_cannot_be_removed_by_config() {
        let policy = PolicyConfig::default(); // no configured patterns
        let tmp = tempfile::tempdir().unwrap();
        let verdict = evaluate(
            &proposal("lint", "let x = eval(input);\n"),
            "",
            &policy,
            tmp.path(),
        );
        match verdict {
            Verdict::Blocked { patterns } => {
                assert_eq!(patterns, vec![r"\beval\s*\(".to_string()]);
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[test]
    fn test_block_names_every_matched_pattern() {
        let policy = PolicyConfig {
            banned_patterns: vec!["danger".into()],
            ..PolicyConfig::default()
        };
        let tmp = tempfile::tempdir().unwrap();
        let verdict = evaluate(
            &proposal("lint", "danger: exec(payload) over TcpStream\n"),
            "",
            &policy,
            tmp.path(),
        );
        match verdict {
            Verdict::Blocked { patterns } => {
                assert_eq!(patterns.len(), 3);
                assert!(patterns.contains(&"danger".to_string()));
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_regex_is_skipped_not_allowed() {
        let policy = PolicyConfig {
            banned_patterns: vec!["([unclosed".into(), "danger".into()],
            ..PolicyConfig::default()
        };
        let tmp = tempfile::tempdir().unwrap();
        // The broken rule is skipped; the valid one still blocks.
        let verdict = evaluate(&proposal("lint", "danger\n"), "", &policy, tmp.path());
        assert!(matches!(verdict, Verdict::Blocked { .. }));
    }

    #[test]
    fn test_budget_boundary_is_inclusive() {
        // 20 original lines, 1 added, budget 5% -> exactly at budget.
        let original = lines(20);
        let proposed = format!("{original}one fresh line\n");
        let (pct, added) = change_delta(&original, &proposed);
        assert_eq!((pct, added), (5, 1));

        let policy = PolicyConfig::default(); // budget 5, threshold 5
        let tmp = tempfile::tempdir().unwrap();
        let verdict = evaluate(&proposal("lint", &proposed), &original, &policy, tmp.path());
        assert_eq!(verdict, Verdict::Allowed);
    }

    #[test]
    fn test_moved_lines_do_not_count_as_added() {
        let original = "alpha\nbeta\ngamma\n";
        let proposed = "gamma\nalpha\nbeta\n";
        let (pct, added) = change_delta(original, proposed);
        assert_eq!((pct, added), (0, 0));
    }

    #[test]
    fn test_empty_original_uses_minimum_denominator() {
        let (pct, added) = change_delta("", "one line\n");
        assert_eq!((pct, added), (100, 1));
    }

    #[test]
    fn test_over_budget_without_trigger_is_rejected() {
        let original = lines(10);
        let proposed = format!("{original}{}", lines(3).replace("line", "added"));
        let policy = PolicyConfig {
            max_budget_pct_without_ack: 50,
            ..PolicyConfig::default()
        };
        let tmp = tempfile::tempdir().unwrap();
        let verdict = evaluate(&proposal("lint", &proposed), &original, &policy, tmp.path());
        assert_eq!(
            verdict,
            Verdict::BudgetExceeded { pct: 30, budget: 5 }
        );
    }

    #[test]
    fn test_trigger_strategy_requires_ack_regardless_of_delta() {
        let policy = PolicyConfig {
            trigger_strategies: vec!["regen".into()],
            ..PolicyConfig::default()
        };
        let tmp = tempfile::tempdir().unwrap();
        let original = "same\n";
        let verdict = evaluate(&proposal("regen", original), original, &policy, tmp.path());
        match verdict {
            Verdict::EscalationRequired { strategy, pct, .. } => {
                assert_eq!(strategy, "regen");
                assert_eq!(pct, 0);
            }
            other => panic!("expected EscalationRequired, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_present_allows_beyond_hard_budget() {
        // Exceeds both the plain budget and the no-ack threshold; with the
        // artifact present the verdict is Allowed, not BudgetExceeded.
        let original = lines(10);
        let proposed = format!("{original}{}", lines(5).replace("line", "added"));
        let policy = PolicyConfig::default();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("human-ack.txt"), "approved").unwrap();
        let verdict = evaluate(&proposal("lint", &proposed), &original, &policy, tmp.path());
        assert_eq!(verdict, Verdict::Allowed);
    }

    #[test]
    fn test_content_scan_precedes_escalation() {
        // Banned content in a trigger strategy is Blocked, never
        // EscalationRequired; safety is not waived by acknowledgment.
        let policy = PolicyConfig {
            trigger_strategies: vec!["regen".into()],
            ..PolicyConfig::default()
        };
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("human-ack.txt"), "approved").unwrap();
        let verdict = evaluate(
            &proposal("regen", "exec(anything)\n"),
            "",
            &policy,
            tmp.path(),
        );
        assert!(matches!(verdict, Verdict::Blocked { .. }));
    }
}
