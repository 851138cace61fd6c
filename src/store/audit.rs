use anyhow::Result;
use rusqlite::params;

use crate::domain::AuditEntry;
use crate::util::dt_to_text;

use super::Store;

/// Append-only, forward-only. No updates or deletes exist for this table.
pub(super) fn insert_audit_row(conn: &rusqlite::Connection, entry: &AuditEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log (tenant_id, actor, action, entity, entity_id, payload, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            entry.tenant_id,
            entry.actor,
            entry.action,
            entry.entity,
            entry.entity_id,
            entry.payload,
            dt_to_text(entry.created_at),
        ],
    )?;
    Ok(())
}

impl Store {
    pub async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        let conn = self.conn.lock().await;
        insert_audit_row(&conn, entry)
    }
}
