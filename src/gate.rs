//! Test Gate
//!
//! Verification units are a registered capability resolved at startup:
//! the gate scans the workspace `tests/` directory once for `test_*.sh`
//! units, and embedders can register in-process units on top. A run
//! executes every unit against a given root -- the staged root during a
//! repair attempt -- and aggregates the verdicts. One faulting unit never
//! aborts the others.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::ForgeConfig;
use crate::types::{TestReport, UnitOutcome, UnitVerdict};

/// File-name prefix that marks a script as a verification unit.
const UNIT_PREFIX: &str = "test_";
/// Script extension the gate recognizes.
const UNIT_EXT: &str = "sh";

/// One named unit of executable verification logic.
///
/// `verify` takes the root to verify against and reports success as a
/// boolean; any `Err` is captured by the gate as a unit fault.
pub trait VerificationUnit {
    fn name(&self) -> &str;
    fn verify(&self, root: &Path) -> Result<bool>;
}

/// A discovered shell-script unit, addressed relative to whatever root it
/// runs against so staged copies are exercised through the staged path.
struct ScriptUnit {
    name: String,
    rel_path: PathBuf,
}

impl VerificationUnit for ScriptUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self, root: &Path) -> Result<bool> {
        let script = root.join(&self.rel_path);
        let output = Command::new("sh")
            .arg(&script)
            .current_dir(root)
            .output()
            .with_context(|| format!("failed to run {}", script.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(unit = %self.name, stderr = %stderr.trim(), "unit exited non-zero");
        }
        Ok(output.status.success())
    }
}

/// The resolved set of verification units.
pub struct TestGate {
    units: Vec<Box<dyn VerificationUnit>>,
}

impl TestGate {
    /// Resolve the gate for a workspace: discover `test_*.sh` scripts in
    /// its tests directory, in name order. The set of units is fixed from
    /// here on.
    pub fn resolve(config: &ForgeConfig) -> Result<Self> {
        let tests_dir = config.tests_dir();
        let mut units: Vec<Box<dyn VerificationUnit>> = Vec::new();

        if tests_dir.is_dir() {
            let mut names: Vec<String> = fs::read_dir(&tests_dir)
                .with_context(|| format!("failed to read {}", tests_dir.display()))?
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| {
                    name.starts_with(UNIT_PREFIX)
                        && Path::new(name).extension().is_some_and(|e| e == UNIT_EXT)
                })
                .collect();
            names.sort();

            for file_name in names {
                let name = file_name.trim_end_matches(".sh").to_string();
                let rel_path = Path::new("tests").join(&file_name);
                units.push(Box::new(ScriptUnit { name, rel_path }));
            }
        }

        Ok(Self { units })
    }

    /// An empty gate, for registering units programmatically.
    pub fn empty() -> Self {
        Self { units: Vec::new() }
    }

    /// Register an in-process unit.
    pub fn register(&mut self, unit: Box<dyn VerificationUnit>) {
        self.units.push(unit);
    }

    /// Names of every resolved unit.
    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// Run every unit against `root` and aggregate the verdicts.
    ///
    /// A unit fault (error or panic) is captured as an error verdict and
    /// the remaining units still run.
    pub fn run(&self, root: &Path) -> TestReport {
        let mut report = TestReport::default();

        for unit in &self.units {
            let verdict = match panic::catch_unwind(AssertUnwindSafe(|| unit.verify(root))) {
                Ok(Ok(true)) => UnitVerdict::Passed,
                Ok(Ok(false)) => UnitVerdict::Failed,
                Ok(Err(e)) => UnitVerdict::Error(e.to_string()),
                Err(payload) => UnitVerdict::Error(panic_message(&*payload)),
            };
            info!(unit = unit.name(), ?verdict, "unit finished");
            report.units.push(UnitOutcome {
                name: unit.name().to_string(),
                verdict,
            });
        }

        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FnUnit {
        name: String,
        f: Box<dyn Fn(&Path) -> Result<bool>>,
    }

    impl VerificationUnit for FnUnit {
        fn name(&self) -> &str {
            &self.name
        }
        fn verify(&self, root: &Path) -> Result<bool> {
            (self.f)(root)
        }
    }

    fn unit(name: &str, f: impl Fn(&Path) -> Result<bool> + 'static) -> Box<FnUnit> {
        Box::new(FnUnit {
            name: name.to_string(),
            f: Box::new(f),
        })
    }

    #[test]
    fn test_aggregate_is_and_of_verdicts() {
        let mut gate = TestGate::empty();
        gate.register(unit("test_a", |_| Ok(true)));
        gate.register(unit("test_b", |_| Ok(false)));
        gate.register(unit("test_c", |_| Ok(true)));

        let report = gate.run(Path::new("."));
        assert!(!report.all_green());
        assert_eq!(report.failing(), vec!["test_b".to_string()]);
    }

    #[test]
    fn test_faulting_unit_does_not_abort_the_rest() {
        let mut gate = TestGate::empty();
        gate.register(unit("test_panics", |_| panic!("unit exploded")));
        gate.register(unit("test_errors", |_| anyhow::bail!("no such fixture")));
        gate.register(unit("test_ok", |_| Ok(true)));

        let report = gate.run(Path::new("."));
        assert_eq!(report.units.len(), 3);
        assert_eq!(
            report.units[0].verdict,
            UnitVerdict::Error("unit exploded".to_string())
        );
        assert!(matches!(report.units[1].verdict, UnitVerdict::Error(_)));
        assert_eq!(report.units[2].verdict, UnitVerdict::Passed);
        assert!(!report.all_green());
    }

    #[test]
    fn test_resolve_discovers_scripts_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ForgeConfig::for_root(tmp.path());
        config.ensure_dirs().unwrap();
        fs::write(config.tests_dir().join("test_zeta.sh"), "exit 0\n").unwrap();
        fs::write(config.tests_dir().join("test_alpha.sh"), "exit 0\n").unwrap();
        fs::write(config.tests_dir().join("helper.sh"), "exit 0\n").unwrap();
        fs::write(config.tests_dir().join("test_notes.txt"), "not a unit").unwrap();

        let gate = TestGate::resolve(&config).unwrap();
        assert_eq!(gate.unit_names(), vec!["test_alpha", "test_zeta"]);
    }

    #[test]
    fn test_script_units_run_against_the_given_root() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ForgeConfig::for_root(tmp.path());
        config.ensure_dirs().unwrap();
        // The unit checks a file that only exists in the root it is handed.
        fs::write(
            config.tests_dir().join("test_marker.sh"),
            "test -f marker.txt\n",
        )
        .unwrap();
        let gate = TestGate::resolve(&config).unwrap();

        // Against the live root: marker absent, unit fails.
        assert!(!gate.run(tmp.path()).all_green());

        // Against a staged copy carrying the marker: unit passes.
        let staged = tempfile::tempdir().unwrap();
        fs::create_dir_all(staged.path().join("tests")).unwrap();
        fs::copy(
            config.tests_dir().join("test_marker.sh"),
            staged.path().join("tests/test_marker.sh"),
        )
        .unwrap();
        fs::write(staged.path().join("marker.txt"), "here").unwrap();
        assert!(gate.run(staged.path()).all_green());
    }
}
