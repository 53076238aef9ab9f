//! Staging Area
//!
//! Builds an isolated, writable copy of the workspace with the proposed
//! content already substituted, so verification exercises exactly the tree
//! a commit would produce. The stage lives inside the transient work dir
//! and is discarded and rebuilt on every attempt -- at most one exists at
//! a time.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::ForgeConfig;
use crate::error::ForgeError;
use crate::types::ChangeProposal;

/// Materialize `proposal` in a fresh stage copy of the workspace.
///
/// Returns the staged root. Any copy failure is fatal to the attempt.
pub fn stage_proposal(
    config: &ForgeConfig,
    proposal: &ChangeProposal,
) -> Result<PathBuf, ForgeError> {
    let stage = config.stage_dir();

    // Discard any stage left over from a previous attempt.
    if stage.exists() {
        fs::remove_dir_all(&stage)
            .map_err(|e| ForgeError::StagingIo(format!("failed to clear previous stage: {e}")))?;
    }

    // The work dir (which contains the stage) and the snapshot dir are
    // never copied: copying the stage into itself would recurse forever,
    // and prior archives have no business in a verification tree.
    let excluded = [config.work_dir(), config.snap_dir()];
    copy_tree(&config.root, &stage, &excluded)?;

    // Substitute the proposed content over the staged target.
    let staged_target = stage.join(&proposal.target);
    if let Some(parent) = staged_target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ForgeError::StagingIo(format!("failed to create staged dirs: {e}")))?;
    }
    fs::write(&staged_target, &proposal.content)
        .map_err(|e| ForgeError::StagingIo(format!("failed to write staged target: {e}")))?;

    info!(stage = %stage.display(), target = %proposal.target.display(), "proposal staged");
    Ok(stage)
}

fn copy_tree(src: &Path, dst: &Path, excluded: &[PathBuf]) -> Result<(), ForgeError> {
    fs::create_dir_all(dst)
        .map_err(|e| ForgeError::StagingIo(format!("failed to create {}: {e}", dst.display())))?;

    let entries = fs::read_dir(src)
        .map_err(|e| ForgeError::StagingIo(format!("failed to read {}: {e}", src.display())))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| ForgeError::StagingIo(format!("failed to read dir entry: {e}")))?;
        let path = entry.path();

        if excluded.iter().any(|ex| ex == &path) {
            continue;
        }
        if entry.file_name() == ".git" {
            continue;
        }

        let dest = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| ForgeError::StagingIo(format!("failed to stat {}: {e}", path.display())))?;

        if file_type.is_dir() {
            copy_tree(&path, &dest, excluded)?;
        } else if file_type.is_file() {
            fs::copy(&path, &dest).map_err(|e| {
                ForgeError::StagingIo(format!("failed to copy {}: {e}", path.display()))
            })?;
        }
        // Symlinks are skipped; the stage is a plain-file tree.
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(content: &str) -> ChangeProposal {
        ChangeProposal {
            target: PathBuf::from("core/registry.rs"),
            content: content.to_string(),
            strategy: "lint".to_string(),
        }
    }

    fn workspace() -> (tempfile::TempDir, ForgeConfig) {
        let tmp = tempfile::tempdir().unwrap();
        let config = ForgeConfig::for_root(tmp.path());
        config.ensure_dirs().unwrap();
        fs::create_dir_all(tmp.path().join("core")).unwrap();
        fs::write(config.target_path(), "original\n").unwrap();
        fs::write(tmp.path().join("README.md"), "# ws\n").unwrap();
        (tmp, config)
    }

    #[test]
    fn test_stage_substitutes_proposal_content() {
        let (_tmp, config) = workspace();
        let stage = stage_proposal(&config, &proposal("proposed\n")).unwrap();
        assert_eq!(
            fs::read_to_string(stage.join("core/registry.rs")).unwrap(),
            "proposed\n"
        );
        // The live target is untouched.
        assert_eq!(fs::read_to_string(config.target_path()).unwrap(), "original\n");
        // The rest of the workspace came along.
        assert!(stage.join("README.md").is_file());
    }

    #[test]
    fn test_stage_excludes_snapshots_and_itself() {
        let (_tmp, config) = workspace();
        fs::write(config.snap_dir().join("old.zip"), "zip").unwrap();
        let stage = stage_proposal(&config, &proposal("x\n")).unwrap();
        assert!(!stage.join("snapshots").exists());
        assert!(!stage.join(".forge").exists());
    }

    #[test]
    fn test_restaging_discards_previous_stage() {
        let (_tmp, config) = workspace();
        let stage = stage_proposal(&config, &proposal("first\n")).unwrap();
        fs::write(stage.join("leftover.txt"), "stale").unwrap();

        let stage = stage_proposal(&config, &proposal("second\n")).unwrap();
        assert!(!stage.join("leftover.txt").exists());
        assert_eq!(
            fs::read_to_string(stage.join("core/registry.rs")).unwrap(),
            "second\n"
        );
    }
}
