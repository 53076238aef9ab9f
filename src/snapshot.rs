//! Snapshot Archive
//!
//! Point-in-time capture of the workspace: every file outside the
//! snapshot and work directories goes into a deflate-compressed zip
//! addressed by timestamp and label, with a manifest of included relative
//! paths appended to the durable index. Snapshots are immutable and never
//! deleted by this subsystem.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::audit;
use crate::config::ForgeConfig;
use crate::error::ForgeError;
use crate::state::Database;
use crate::types::{Actor, SnapshotRecord};

/// Capture the workspace into a new archive and index it.
///
/// The archive is written to a temporary path and renamed into place
/// before the index insert; if indexing fails the archive is removed, so
/// no index record ever references a missing archive and no archive is
/// left unindexed.
pub fn create_snapshot(
    config: &ForgeConfig,
    db: &Database,
    label: &str,
) -> Result<SnapshotRecord> {
    let ts = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let zip_path = config.snap_dir().join(format!("{ts}_{label}.zip"));
    let tmp_path = config.snap_dir().join(format!("{ts}_{label}.zip.tmp"));

    fs::create_dir_all(config.snap_dir())
        .map_err(|e| ForgeError::SnapshotIo(format!("failed to create snapshot dir: {e}")))?;

    let manifest = write_archive(config, &tmp_path)
        .map_err(|e| ForgeError::SnapshotIo(e.to_string()))?;

    fs::rename(&tmp_path, &zip_path)
        .map_err(|e| ForgeError::SnapshotIo(format!("failed to finalize archive: {e}")))?;

    let record = SnapshotRecord {
        timestamp: ts,
        label: label.to_string(),
        path: zip_path.to_string_lossy().to_string(),
        manifest,
    };

    if let Err(e) = db.insert_snapshot(&record) {
        // Keep archive and index consistent: no unindexed archive.
        let _ = fs::remove_file(&zip_path);
        return Err(ForgeError::SnapshotIo(format!("failed to index snapshot: {e}")).into());
    }

    audit::record(
        db,
        Actor::Governor,
        "snapshot",
        &serde_json::json!({ "label": label, "zip": record.path }).to_string(),
    )?;

    info!(path = %record.path, files = record.manifest.len(), "snapshot created");
    Ok(record)
}

/// Walk the workspace and write every included file into the archive at
/// `tmp_path`. Returns the manifest in walk order.
fn write_archive(config: &ForgeConfig, tmp_path: &Path) -> Result<Vec<String>> {
    let file = fs::File::create(tmp_path)?;
    let mut zip = ZipWriter::new(file);

    // The snapshot dir (where this very archive lands) and the transient
    // work dir never belong in a capture. Everything else, including the
    // state database, is included for a full rollback point.
    let excluded = [config.snap_dir(), config.work_dir()];

    let mut manifest = Vec::new();
    add_dir(&mut zip, &config.root, &config.root, &excluded, &mut manifest)?;

    zip.finish()?;
    Ok(manifest)
}

fn add_dir(
    zip: &mut ZipWriter<fs::File>,
    root: &Path,
    dir: &Path,
    excluded: &[PathBuf],
    manifest: &mut Vec<String>,
) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if excluded.iter().any(|ex| ex == &path) {
            continue;
        }
        if entry.file_name() == ".git" {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            add_dir(zip, root, &path, excluded, manifest)?;
        } else if file_type.is_file() {
            let rel = path
                .strip_prefix(root)
                .with_context(|| format!("path escaped workspace root: {}", path.display()))?
                .to_string_lossy()
                .to_string();
            let bytes = fs::read(&path)?;
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            zip.start_file(rel.clone(), options)?;
            zip.write_all(&bytes)?;
            manifest.push(rel);
        }
    }

    Ok(())
}
