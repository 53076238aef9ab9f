//! Repair Governor
//!
//! One ordered state machine per repair attempt:
//! freeze check -> planning -> policy check -> staging -> testing ->
//! snapshotting -> committing. Terminal failures short-circuit with a
//! distinct outcome, and every terminal state -- success or failure --
//! produces exactly one audit entry describing it. Committing is the only
//! state that mutates the live workspace, and the snapshot rollback point
//! always exists before it runs.

use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::audit;
use crate::config::ForgeConfig;
use crate::error::ForgeError;
use crate::gate::TestGate;
use crate::policy::{self, PolicyConfig, Verdict};
use crate::snapshot;
use crate::stage;
use crate::state;
use crate::state::Database;
use crate::strategy::StrategyRegistry;
use crate::types::{Actor, RepairOutcome};

/// Run one repair attempt to a terminal state.
///
/// An exclusive advisory lock is held for the whole attempt: staging, the
/// snapshot index, and the audit log are shared resources at fixed paths,
/// so concurrent attempts must serialize.
pub fn run_repair(
    config: &ForgeConfig,
    db: &Database,
    strategies: &StrategyRegistry,
    gate: &TestGate,
    strategy_name: &str,
) -> Result<RepairOutcome> {
    let lock_file = fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(config.lock_path())
        .map_err(|e| ForgeError::LockUnavailable(e.to_string()))?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock
        .write()
        .map_err(|e| ForgeError::LockUnavailable(e.to_string()))?;

    // ── FreezeCheck ── read once, injected into the rest of the attempt.
    if state::is_frozen(config) {
        audit::record(
            db,
            Actor::Governor,
            "frozen",
            &serde_json::json!({ "strategy": strategy_name }).to_string(),
        )?;
        return Ok(RepairOutcome::Frozen);
    }

    // Policy is loaded fresh per attempt so edits take effect immediately;
    // immutable from here on.
    let policy_config = PolicyConfig::load(&config.policy_path())?;

    // ── Planning ── obtain the proposal from the strategy collaborator.
    let strategy = strategies
        .get(strategy_name)
        .ok_or_else(|| ForgeError::UnknownStrategy(strategy_name.to_string()))?;
    let proposal = strategy.propose(&config.root, &config.target)?;
    write_plan(config, strategy_name)?;

    let original = fs::read_to_string(config.target_path()).unwrap_or_default();
    info!(
        strategy = strategy_name,
        budget = policy_config.change_budget_pct,
        require_green = policy_config.require_green_tests,
        "attempt planned"
    );

    // ── PolicyCheck ──
    match policy::evaluate(&proposal, &original, &policy_config, &config.root) {
        Verdict::Allowed => {}
        Verdict::Blocked { patterns } => {
            audit::record(
                db,
                Actor::Warden,
                "block",
                &serde_json::json!({ "patterns": patterns }).to_string(),
            )?;
            return Ok(RepairOutcome::Blocked { patterns });
        }
        Verdict::EscalationRequired {
            strategy,
            pct,
            threshold,
            require,
        } => {
            audit::record(
                db,
                Actor::Warden,
                "escalation_required",
                &serde_json::json!({
                    "strategy": strategy,
                    "pct": pct,
                    "maxNoAck": threshold,
                    "require": require,
                })
                .to_string(),
            )?;
            return Ok(RepairOutcome::EscalationRequired {
                strategy,
                pct,
                threshold,
                require,
            });
        }
        Verdict::BudgetExceeded { pct, budget } => {
            audit::record(
                db,
                Actor::Warden,
                "reject_change_budget",
                &serde_json::json!({ "pct": pct, "budget": budget }).to_string(),
            )?;
            return Ok(RepairOutcome::BudgetExceeded { pct, budget });
        }
    }

    // ── Staging ── fatal on failure; nothing downstream runs.
    let staged_root = match stage::stage_proposal(config, &proposal) {
        Ok(root) => root,
        Err(e) => {
            audit::record(
                db,
                Actor::Governor,
                "staging_failed",
                &serde_json::json!({ "error": e.to_string() }).to_string(),
            )?;
            return Err(e.into());
        }
    };

    // ── Testing ── the gate runs against the staged copy, never the live
    // workspace.
    let report = gate.run(&staged_root);
    if !report.all_green() {
        let failing = report.failing();
        if policy_config.require_green_tests {
            audit::record(
                db,
                Actor::Gate,
                "fail",
                &serde_json::json!({ "failing": failing }).to_string(),
            )?;
            return Ok(RepairOutcome::TestsFailed { failing });
        }
        warn!(?failing, "gate is red; proceeding (green tests not required)");
    }

    // ── Snapshotting ── the rollback point must exist before the live
    // artifact changes.
    if let Err(e) = snapshot::create_snapshot(config, db, "auto-repair") {
        audit::record(
            db,
            Actor::Governor,
            "snapshot_failed",
            &serde_json::json!({ "error": e.to_string() }).to_string(),
        )?;
        return Err(e);
    }

    // ── Committing ── the only mutation of the live workspace.
    let (pct, added_lines) = policy::change_delta(&original, &proposal.content);
    let target = config.target_path();
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create target dirs: {}", parent.display()))?;
    }
    fs::write(&target, &proposal.content)
        .with_context(|| format!("failed to write target: {}", target.display()))?;

    audit::record(
        db,
        Actor::Governor,
        "apply",
        &serde_json::json!({
            "file": target.to_string_lossy(),
            "addedLines": added_lines,
            "pct": pct,
        })
        .to_string(),
    )?;

    info!(target = %target.display(), added_lines, pct, "repair applied");
    Ok(RepairOutcome::Applied { added_lines, pct })
}

/// Record what this attempt is about to do in the work dir.
fn write_plan(config: &ForgeConfig, strategy_name: &str) -> Result<()> {
    fs::create_dir_all(config.work_dir()).context("failed to create work dir")?;
    let plan = serde_json::json!({
        "strategy": strategy_name,
        "target": config.target.to_string_lossy(),
        "plannedAt": chrono::Utc::now().to_rfc3339(),
    });
    fs::write(
        config.work_dir().join("plan.json"),
        serde_json::to_string_pretty(&plan)?,
    )
    .context("failed to write plan record")?;
    Ok(())
}
