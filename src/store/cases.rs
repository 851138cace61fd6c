use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use crate::domain::{Case, CaseStatus, Disposition};
use crate::util::{dt_to_text, text_to_dt};

use super::Store;

/// At most one open case per `(tenant_id, invoice_id)`. Updates never
/// overwrite disposition fields once set (spec.md §4.9).
pub(super) fn upsert_case_row(conn: &rusqlite::Connection, case: &Case) -> Result<()> {
    let existing_id: Option<String> = conn
        .query_row(
            "SELECT case_id FROM cases WHERE tenant_id = ?1 AND invoice_id = ?2 AND status = 'OPEN'",
            params![case.tenant_id, case.invoice_id],
            |r| r.get(0),
        )
        .optional()?;

    if let Some(existing_id) = existing_id {
        // Refresh SLA only; disposition is set exclusively via `dispose_case`.
        conn.execute(
            "UPDATE cases SET sla_due = ?1 WHERE tenant_id = ?2 AND case_id = ?3",
            params![dt_to_text(case.sla_due), case.tenant_id, existing_id],
        )?;
        return Ok(());
    }

    conn.execute(
        "INSERT INTO cases (tenant_id, case_id, invoice_id, status, sla_due)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            case.tenant_id,
            case.case_id,
            case.invoice_id,
            case.status.as_str(),
            dt_to_text(case.sla_due),
        ],
    )?;
    Ok(())
}

pub(super) fn query_open_case(conn: &rusqlite::Connection, tenant_id: &str, invoice_id: &str) -> Result<Option<Case>> {
    conn.query_row(
        "SELECT tenant_id, case_id, invoice_id, status, sla_due,
            disposition_user, disposition_timestamp, disposition_label, disposition_notes
         FROM cases WHERE tenant_id = ?1 AND invoice_id = ?2 AND status = 'OPEN'",
        params![tenant_id, invoice_id],
        row_to_case,
    )
    .optional()
    .map_err(Into::into)
}

impl Store {
    pub async fn upsert_case(&self, case: &Case) -> Result<()> {
        let conn = self.conn.lock().await;
        upsert_case_row(&conn, case)
    }

    pub async fn dispose_case(
        &self,
        tenant_id: &str,
        case_id: &str,
        disposition: &Disposition,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE cases SET
                status = 'CLOSED',
                disposition_user = COALESCE(disposition_user, ?1),
                disposition_timestamp = COALESCE(disposition_timestamp, ?2),
                disposition_label = COALESCE(disposition_label, ?3),
                disposition_notes = COALESCE(disposition_notes, ?4)
             WHERE tenant_id = ?5 AND case_id = ?6",
            params![
                disposition.user,
                dt_to_text(disposition.timestamp),
                disposition.label,
                disposition.notes,
                tenant_id,
                case_id,
            ],
        )?;
        Ok(())
    }

    pub async fn find_open_case(&self, tenant_id: &str, invoice_id: &str) -> Result<Option<Case>> {
        let conn = self.conn.lock().await;
        query_open_case(&conn, tenant_id, invoice_id)
    }
}

pub(super) fn row_to_case(r: &rusqlite::Row) -> rusqlite::Result<Case> {
    let status: String = r.get(3)?;
    let disposition = match r.get::<_, Option<String>>(5)? {
        Some(user) => Some(Disposition {
            user,
            timestamp: r
                .get::<_, Option<String>>(6)?
                .and_then(|s| text_to_dt(&s).ok())
                .unwrap_or_else(chrono::Utc::now),
            label: r.get::<_, Option<String>>(7)?.unwrap_or_default(),
            notes: r.get::<_, Option<String>>(8)?,
        }),
        None => None,
    };

    Ok(Case {
        tenant_id: r.get(0)?,
        case_id: r.get(1)?,
        invoice_id: r.get(2)?,
        status: if status == "OPEN" {
            CaseStatus::Open
        } else {
            CaseStatus::Closed
        },
        sla_due: r
            .get::<_, String>(4)
            .and_then(|s| text_to_dt(&s).map_err(|_| rusqlite::Error::InvalidQuery))?,
        disposition,
    })
}
