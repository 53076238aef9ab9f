//! Freeze Flag
//!
//! A single process-wide boolean persisted as the presence of a flag file.
//! Set by `freeze`, cleared by `thaw`, read once at the start of every
//! repair attempt. While set, no commit may occur.

use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::ForgeConfig;

/// Whether self-modification is currently disabled.
pub fn is_frozen(config: &ForgeConfig) -> bool {
    config.freeze_flag().exists()
}

/// Disable self-modification.
pub fn freeze(config: &ForgeConfig) -> Result<()> {
    let flag = config.freeze_flag();
    if let Some(parent) = flag.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create state dir: {}", parent.display()))?;
    }
    fs::write(&flag, "1")
        .with_context(|| format!("failed to write freeze flag: {}", flag.display()))?;
    info!(flag = %flag.display(), "forge frozen");
    Ok(())
}

/// Re-enable self-modification (still subject to policy).
pub fn thaw(config: &ForgeConfig) -> Result<()> {
    let flag = config.freeze_flag();
    if flag.exists() {
        fs::remove_file(&flag)
            .with_context(|| format!("failed to remove freeze flag: {}", flag.display()))?;
    }
    info!(flag = %flag.display(), "forge thawed");
    Ok(())
}
