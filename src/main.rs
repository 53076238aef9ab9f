//! Forge CLI
//!
//! The operator surface for the self-repair governor: status, freeze and
//! thaw, snapshots, the repair pipeline, and the test gate.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use forge::audit;
use forge::config::ForgeConfig;
use forge::gate::TestGate;
use forge::governor;
use forge::snapshot;
use forge::state::{self, Database};
use forge::strategy::StrategyRegistry;
use forge::types::{Actor, RepairOutcome, UnitVerdict};

/// Forge -- Self-Repair Governor
#[derive(Parser, Debug)]
#[command(
    name = "forge",
    version,
    about = "Governor for automated, self-applied code changes"
)]
struct Cli {
    /// Workspace root to govern.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report the freeze flag, audit count, and snapshot count.
    Status,
    /// Disable self-modification.
    Freeze,
    /// Re-enable self-modification (subject to policy).
    Thaw,
    /// List registered strategies and resolved verification units.
    ListCommands,
    /// Capture a snapshot of the workspace.
    Snapshot {
        #[arg(long, default_value = "manual")]
        label: String,
    },
    /// Run one repair attempt through the full pipeline.
    Repair {
        #[arg(long, default_value = "lint", value_parser = ["lint", "refactor", "regen"])]
        strategy: String,
    },
    /// Run the verification units against the live workspace.
    Test,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Fatal: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("workspace root not found: {}", cli.root.display()))?;
    let config = ForgeConfig::for_root(&root);
    config.ensure_dirs()?;
    let db = Database::open(&config.db_path())?;

    match cli.command {
        Command::Status => {
            let frozen = state::is_frozen(&config);
            println!("forge :: status");
            println!("  location : {}", config.root.display());
            println!(
                "  frozen   : {}",
                if frozen { "YES".red() } else { "no".green() }
            );
            println!("  logs     : {}", audit::count(&db));
            println!("  snapshots: {}", db.snapshot_count().unwrap_or(0));

            let recent = audit::recent(&db, 5);
            if !recent.is_empty() {
                println!("  recent   :");
                for entry in recent {
                    println!("    [{}] {} {}", entry.timestamp, entry.actor, entry.action);
                }
            }
            Ok(0)
        }
        Command::Freeze => {
            state::freeze(&config)?;
            audit::record(&db, Actor::Operator, "freeze", "freeze=1")?;
            println!("Forge frozen. Self-modification disabled.");
            Ok(0)
        }
        Command::Thaw => {
            state::thaw(&config)?;
            audit::record(&db, Actor::Operator, "thaw", "freeze=0")?;
            println!("Forge thawed. Self-modification enabled (subject to policy).");
            Ok(0)
        }
        Command::ListCommands => {
            let strategies = StrategyRegistry::builtin();
            let gate = TestGate::resolve(&config)?;
            println!("Strategies:");
            for name in strategies.names() {
                println!("  - {name}");
            }
            println!("Verification units:");
            for name in gate.unit_names() {
                println!("  - {name}");
            }
            Ok(0)
        }
        Command::Snapshot { label } => {
            let record = snapshot::create_snapshot(&config, &db, &label)?;
            println!("Snapshot created: {}", record.path);
            Ok(0)
        }
        Command::Repair { strategy } => {
            let strategies = StrategyRegistry::builtin();
            let gate = TestGate::resolve(&config)?;
            let outcome = governor::run_repair(&config, &db, &strategies, &gate, &strategy)?;
            report_outcome(&outcome);
            Ok(outcome.exit_code())
        }
        Command::Test => {
            let gate = TestGate::resolve(&config)?;
            let report = gate.run(&config.root);
            for unit in &report.units {
                let verdict = match &unit.verdict {
                    UnitVerdict::Passed => "OK".green().to_string(),
                    UnitVerdict::Failed => "FAIL".red().to_string(),
                    UnitVerdict::Error(msg) => format!("{} {msg}", "ERR".red()),
                };
                println!("[test] {}: {verdict}", unit.name);
            }
            let green = report.all_green();
            println!(
                "ALL TESTS {}",
                if green {
                    "PASS".green()
                } else {
                    "FAIL".red()
                }
            );
            Ok(if green { 0 } else { 1 })
        }
    }
}

fn report_outcome(outcome: &RepairOutcome) {
    match outcome {
        RepairOutcome::Applied { added_lines, pct } => {
            println!("[apply] repair applied ({added_lines} added lines, {pct}%)");
        }
        RepairOutcome::Frozen => {
            eprintln!("ERROR: forge is frozen. Thaw to run repair.");
        }
        RepairOutcome::Blocked { patterns } => {
            eprintln!("[warden] BLOCK: patterns={patterns:?}");
        }
        RepairOutcome::BudgetExceeded { pct, budget } => {
            eprintln!("[warden] REJECT: change size {pct}% exceeds budget {budget}%");
        }
        RepairOutcome::TestsFailed { failing } => {
            eprintln!("[tests] FAIL: {failing:?}; aborting.");
        }
        RepairOutcome::EscalationRequired {
            strategy,
            pct,
            threshold,
            require,
        } => {
            eprintln!(
                "[warden] ESCALATION REQUIRED: create {require} to proceed \
                 (strategy={strategy}, change size {pct}% > {threshold}%)."
            );
        }
    }
}
