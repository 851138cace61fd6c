//! Cross-entity writes the spec requires as a single atomic unit (spec.md
//! §4.2, §5, §7): snapshot + lines + remit sighting commit together, and
//! decision + case + audit commit together — both all-or-nothing.

use anyhow::Result;
use chrono::Utc;

use crate::domain::{AuditEntry, Case, Decision, InvoiceRow, LineRow};

use super::{audit, cases, decisions, invoices, remit, Store};

impl Store {
    /// Insert-if-absent snapshot + lines + (optional) remit sighting update,
    /// all in one transaction. Returns `true` if a new snapshot was created.
    pub async fn persist_invoice_snapshot(
        &self,
        row: &InvoiceRow,
        lines: &[LineRow],
        remit_account_hash: Option<&str>,
        remit_name: Option<&str>,
    ) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        if invoices::invoice_exists(&tx, &row.tenant_id, &row.invoice_id)? {
            tx.commit()?;
            return Ok(false);
        }

        invoices::insert_invoice_row(&tx, row)?;
        invoices::insert_line_rows(&tx, lines)?;
        if let Some(hash) = remit_account_hash {
            remit::upsert_remit_row(&tx, &row.tenant_id, &row.vendor_id, hash, remit_name, Utc::now())?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// Persist a decision, open/refresh its case (unless `candidate_case` is
    /// `None`, i.e. the decision was PASS), and append the audit entry, all
    /// in one transaction. Returns the resulting open case, if any.
    pub async fn persist_outcome(
        &self,
        decision: &Decision,
        candidate_case: Option<&Case>,
        audit_entry: &AuditEntry,
    ) -> Result<Option<Case>> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        decisions::insert_decision_row(&tx, decision)?;

        if let Some(case) = candidate_case {
            cases::upsert_case_row(&tx, case)?;
        }

        audit::insert_audit_row(&tx, audit_entry)?;

        let result_case = if candidate_case.is_some() {
            cases::query_open_case(&tx, &decision.tenant_id, &decision.invoice_id)?
        } else {
            None
        };

        tx.commit()?;
        Ok(result_case)
    }
}
