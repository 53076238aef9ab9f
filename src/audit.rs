//! Audit Log
//!
//! Append-only ledger of every governance action. Entries are recorded
//! with an RFC3339 UTC timestamp and are never mutated or deleted.

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::state::Database;
use crate::types::{Actor, AuditEntry};

/// Record a governance action in the audit log.
///
/// Returns the newly created [`AuditEntry`].
pub fn record(db: &Database, actor: Actor, action: &str, detail: &str) -> Result<AuditEntry> {
    let entry = AuditEntry {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now().to_rfc3339(),
        actor,
        action: action.to_string(),
        detail: detail.to_string(),
    };

    db.insert_audit(&entry)
        .context("failed to insert audit log entry")?;

    Ok(entry)
}

/// Retrieve the most recent `limit` entries, oldest first.
pub fn recent(db: &Database, limit: u32) -> Vec<AuditEntry> {
    db.recent_audit(limit as i64).unwrap_or_default()
}

/// Total number of recorded entries.
pub fn count(db: &Database) -> i64 {
    db.audit_count().unwrap_or(0)
}
