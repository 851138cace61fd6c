//! Table definitions for the snapshot store.
//! Mission: one `CREATE TABLE IF NOT EXISTS` per entity in spec.md §3,
//! composite primary keys leading with `tenant_id`, in the teacher's
//! `VaultDb::new` style.

use anyhow::Result;
use rusqlite::Connection;

pub fn init(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "foreign_keys", "ON").ok();

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS invoices (
            tenant_id TEXT NOT NULL,
            invoice_id TEXT NOT NULL,
            vendor_id TEXT NOT NULL,
            vendor_name TEXT NOT NULL,
            invoice_number_raw TEXT NOT NULL,
            invoice_number_norm TEXT NOT NULL,
            invoice_date TEXT NOT NULL,
            currency TEXT NOT NULL,
            total TEXT NOT NULL,
            tax_total TEXT,
            po_number TEXT,
            remit_account_hash TEXT,
            remit_account_masked TEXT,
            remit_name TEXT,
            pdf_hash TEXT,
            terms TEXT,
            payload_hash TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            normalizer_version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, invoice_id)
        );

        CREATE INDEX IF NOT EXISTS idx_invoices_vendor
            ON invoices(tenant_id, vendor_id);
        CREATE INDEX IF NOT EXISTS idx_invoices_invnum
            ON invoices(tenant_id, vendor_id, invoice_number_norm);
        CREATE INDEX IF NOT EXISTS idx_invoices_po
            ON invoices(tenant_id, vendor_id, po_number);
        CREATE INDEX IF NOT EXISTS idx_invoices_remit
            ON invoices(tenant_id, vendor_id, remit_account_hash);

        CREATE TABLE IF NOT EXISTS invoice_lines (
            tenant_id TEXT NOT NULL,
            invoice_id TEXT NOT NULL,
            line_no INTEGER NOT NULL,
            description TEXT NOT NULL,
            qty TEXT NOT NULL,
            unit_price TEXT NOT NULL,
            amount TEXT NOT NULL,
            sku TEXT,
            gl_code TEXT,
            cost_center TEXT,
            PRIMARY KEY (tenant_id, invoice_id, line_no)
        );

        CREATE TABLE IF NOT EXISTS remit_sightings (
            tenant_id TEXT NOT NULL,
            vendor_id TEXT NOT NULL,
            remit_account_hash TEXT NOT NULL,
            remit_name TEXT,
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            PRIMARY KEY (tenant_id, vendor_id, remit_account_hash)
        );

        CREATE TABLE IF NOT EXISTS vendor_baselines (
            tenant_id TEXT NOT NULL,
            vendor_id TEXT NOT NULL,
            median TEXT NOT NULL,
            mad_like TEXT NOT NULL,
            sample_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, vendor_id)
        );

        CREATE TABLE IF NOT EXISTS decisions (
            tenant_id TEXT NOT NULL,
            decision_id TEXT NOT NULL,
            invoice_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            model_version TEXT NOT NULL,
            ruleset_version TEXT NOT NULL,
            risk_score TEXT NOT NULL,
            decision TEXT NOT NULL,
            reason_codes TEXT NOT NULL,
            top_matches TEXT NOT NULL,
            explanations TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, decision_id)
        );

        CREATE INDEX IF NOT EXISTS idx_decisions_invoice
            ON decisions(tenant_id, invoice_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS cases (
            tenant_id TEXT NOT NULL,
            case_id TEXT NOT NULL,
            invoice_id TEXT NOT NULL,
            status TEXT NOT NULL,
            sla_due TEXT NOT NULL,
            disposition_user TEXT,
            disposition_timestamp TEXT,
            disposition_label TEXT,
            disposition_notes TEXT,
            PRIMARY KEY (tenant_id, case_id)
        );

        CREATE INDEX IF NOT EXISTS idx_cases_invoice
            ON cases(tenant_id, invoice_id);

        CREATE TABLE IF NOT EXISTS audit_log (
            tenant_id TEXT NOT NULL,
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            entity TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_tenant_entity
            ON audit_log(tenant_id, entity, entity_id);

        CREATE TABLE IF NOT EXISTS text_index (
            tenant_id TEXT NOT NULL,
            invoice_id TEXT NOT NULL,
            vendor_id TEXT NOT NULL,
            blob TEXT NOT NULL,
            PRIMARY KEY (tenant_id, invoice_id)
        );

        CREATE TABLE IF NOT EXISTS config_overrides (
            tenant_id TEXT NOT NULL,
            scope TEXT NOT NULL,
            key TEXT NOT NULL,
            value REAL NOT NULL,
            PRIMARY KEY (tenant_id, scope, key)
        );
        ",
    )?;

    Ok(())
}
