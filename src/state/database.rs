//! Forge Database
//!
//! SQLite-backed persistence for the audit log and snapshot index.
//! Uses rusqlite for synchronous, single-process access.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::types::{Actor, AuditEntry, SnapshotRecord};

use super::schema::{CREATE_TABLES, SCHEMA_VERSION};

/// Handle over the forge's durable tables.
///
/// Both tables are append-only: rows are inserted and read, never updated
/// or deleted by this crate.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create db directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database: {}", db_path.display()))?;

        // WAL for better concurrent read behavior while an attempt holds
        // the connection.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::init_schema(conn)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init_schema(Connection::open_in_memory()?)
    }

    fn init_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES)
            .context("failed to create tables")?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            params![SCHEMA_VERSION],
        )
        .context("failed to record schema version")?;
        Ok(Self { conn })
    }

    // ─── Audit log ───────────────────────────────────────────────

    pub fn insert_audit(&self, entry: &AuditEntry) -> Result<()> {
        let actor_str = serde_json::to_string(&entry.actor)?;
        let actor_str = actor_str.trim_matches('"');
        self.conn.execute(
            "INSERT INTO audit_log (entry_id, ts, actor, action, detail)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id,
                entry.timestamp,
                actor_str,
                entry.action,
                entry.detail,
            ],
        )?;
        Ok(())
    }

    pub fn audit_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent `limit` audit entries, oldest first. Rowid breaks
    /// timestamp ties so the total order is stable.
    pub fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, ts, actor, action, detail
             FROM audit_log ORDER BY ts DESC, id DESC LIMIT ?1",
        )?;
        let mut entries: Vec<AuditEntry> = stmt
            .query_map(params![limit], |row| {
                let actor_str: String = row.get(2)?;
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    actor: serde_json::from_str(&format!("\"{}\"", actor_str))
                        .unwrap_or(Actor::Governor),
                    action: row.get(3)?,
                    detail: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        entries.reverse();
        Ok(entries)
    }

    /// Count entries recorded for a given action name.
    pub fn audit_count_for_action(&self, action: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE action = ?1",
            params![action],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ─── Snapshot index ──────────────────────────────────────────

    pub fn insert_snapshot(&self, record: &SnapshotRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO snapshots (ts, label, path, manifest)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.timestamp,
                record.label,
                record.path,
                serde_json::to_string(&record.manifest)?,
            ],
        )?;
        Ok(())
    }

    pub fn snapshot_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most recent `limit` snapshot records, oldest first.
    pub fn recent_snapshots(&self, limit: i64) -> Result<Vec<SnapshotRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT ts, label, path, manifest
             FROM snapshots ORDER BY ts DESC, id DESC LIMIT ?1",
        )?;
        let mut records: Vec<SnapshotRecord> = stmt
            .query_map(params![limit], |row| {
                let manifest_json: String = row.get(3)?;
                Ok(SnapshotRecord {
                    timestamp: row.get(0)?,
                    label: row.get(1)?,
                    path: row.get(2)?,
                    manifest: serde_json::from_str(&manifest_json).unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.reverse();
        Ok(records)
    }
}
