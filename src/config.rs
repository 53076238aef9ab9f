//! Forge Configuration
//!
//! Workspace layout for the governor. Every path is derived from a single
//! workspace root so an instance can govern any directory it is pointed at.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Directory holding durable state (database, freeze flag, lock).
const STATE_DIR: &str = "state";
/// Directory holding snapshot archives.
const SNAP_DIR: &str = "snapshots";
/// Transient working area (stage copy, plan record). Never snapshotted.
const WORK_DIR: &str = ".forge";
/// Directory holding policy files.
const POLICY_DIR: &str = "policies";
/// Directory holding verification units.
const TESTS_DIR: &str = "tests";

/// SQLite index file name within the state directory.
const DB_FILENAME: &str = "index.sqlite";
/// Freeze flag file name within the state directory.
const FREEZE_FILENAME: &str = "FREEZE";
/// Advisory lock file name within the state directory.
const LOCK_FILENAME: &str = "forge.lock";
/// Policy file name within the policy directory.
const POLICY_FILENAME: &str = "repair.policy.yaml";

/// Resolved workspace layout.
#[derive(Clone, Debug)]
pub struct ForgeConfig {
    /// Workspace root. All other paths live under it.
    pub root: PathBuf,
    /// Artifact the repair strategies operate on, relative to the root.
    pub target: PathBuf,
}

impl ForgeConfig {
    /// Build a config rooted at `root` with the default repair target.
    pub fn for_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            target: PathBuf::from("core/registry.rs"),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn snap_dir(&self) -> PathBuf {
        self.root.join(SNAP_DIR)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root.join(WORK_DIR)
    }

    pub fn policy_dir(&self) -> PathBuf {
        self.root.join(POLICY_DIR)
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.root.join(TESTS_DIR)
    }

    /// Stage copy of the workspace, inside the transient work dir.
    pub fn stage_dir(&self) -> PathBuf {
        self.work_dir().join("stage")
    }

    pub fn db_path(&self) -> PathBuf {
        self.state_dir().join(DB_FILENAME)
    }

    pub fn freeze_flag(&self) -> PathBuf {
        self.state_dir().join(FREEZE_FILENAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILENAME)
    }

    pub fn policy_path(&self) -> PathBuf {
        self.policy_dir().join(POLICY_FILENAME)
    }

    /// Absolute path of the live repair target.
    pub fn target_path(&self) -> PathBuf {
        self.root.join(&self.target)
    }

    /// Create the directories the governor expects to exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.state_dir(),
            self.snap_dir(),
            self.work_dir(),
            self.policy_dir(),
            self.tests_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}
