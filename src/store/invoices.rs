use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::domain::{InvoiceRow, LineRow};
use crate::util::{
    date_to_text, dec_opt_to_text, dec_to_text, dt_to_text, text_opt_to_dec, text_to_date,
    text_to_dec, text_to_dt,
};

use super::Store;

/// `true` if `(tenant_id, invoice_id)` has a snapshot already.
pub(super) fn invoice_exists(conn: &rusqlite::Connection, tenant_id: &str, invoice_id: &str) -> Result<bool> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM invoices WHERE tenant_id = ?1 AND invoice_id = ?2",
            params![tenant_id, invoice_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(existing.is_some())
}

pub(super) fn insert_invoice_row(conn: &rusqlite::Connection, row: &InvoiceRow) -> Result<()> {
    conn.execute(
        "INSERT INTO invoices (
            tenant_id, invoice_id, vendor_id, vendor_name, invoice_number_raw,
            invoice_number_norm, invoice_date, currency, total, tax_total,
            po_number, remit_account_hash, remit_account_masked, remit_name,
            pdf_hash, terms, payload_hash, payload_json, normalizer_version, created_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
        params![
            row.tenant_id,
            row.invoice_id,
            row.vendor_id,
            row.vendor_name,
            row.invoice_number_raw,
            row.invoice_number_norm,
            date_to_text(row.invoice_date),
            row.currency,
            dec_to_text(row.total),
            dec_opt_to_text(row.tax_total),
            row.po_number,
            row.remit_account_hash,
            row.remit_account_masked,
            row.remit_name,
            row.pdf_hash,
            row.terms,
            row.payload_hash,
            row.payload_json,
            row.normalizer_version,
            dt_to_text(row.created_at),
        ],
    )?;
    Ok(())
}

pub(super) fn insert_line_rows(conn: &rusqlite::Connection, lines: &[LineRow]) -> Result<()> {
    for line in lines {
        conn.execute(
            "INSERT INTO invoice_lines (
                tenant_id, invoice_id, line_no, description, qty, unit_price,
                amount, sku, gl_code, cost_center
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                line.tenant_id,
                line.invoice_id,
                line.line_no,
                line.description,
                dec_to_text(line.qty),
                dec_to_text(line.unit_price),
                dec_to_text(line.amount),
                line.sku,
                line.gl_code,
                line.cost_center,
            ],
        )?;
    }
    Ok(())
}

impl Store {
    /// Insert-if-absent semantics keyed by `(tenant_id, invoice_id)`.
    /// A second call with the same key is a no-op on the snapshot and its
    /// lines; returns `true` if a new snapshot was created.
    pub async fn upsert_invoice(&self, row: &InvoiceRow, lines: &[LineRow]) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        if invoice_exists(&tx, &row.tenant_id, &row.invoice_id)? {
            tx.commit()?;
            return Ok(false);
        }

        insert_invoice_row(&tx, row)?;
        insert_line_rows(&tx, lines)?;

        tx.commit()?;
        Ok(true)
    }

    pub async fn load_invoice_row(
        &self,
        tenant_id: &str,
        invoice_id: &str,
    ) -> Result<Option<InvoiceRow>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT tenant_id, invoice_id, vendor_id, vendor_name, invoice_number_raw,
                    invoice_number_norm, invoice_date, currency, total, tax_total,
                    po_number, remit_account_hash, remit_account_masked, remit_name,
                    pdf_hash, terms, payload_hash, payload_json, normalizer_version, created_at
                 FROM invoices WHERE tenant_id = ?1 AND invoice_id = ?2",
                params![tenant_id, invoice_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, String>(6)?,
                        r.get::<_, String>(7)?,
                        r.get::<_, String>(8)?,
                        r.get::<_, Option<String>>(9)?,
                        r.get::<_, Option<String>>(10)?,
                        r.get::<_, Option<String>>(11)?,
                        r.get::<_, Option<String>>(12)?,
                        r.get::<_, Option<String>>(13)?,
                        r.get::<_, Option<String>>(14)?,
                        r.get::<_, Option<String>>(15)?,
                        r.get::<_, String>(16)?,
                        r.get::<_, String>(17)?,
                        r.get::<_, i64>(18)?,
                        r.get::<_, String>(19)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            tenant_id,
            invoice_id,
            vendor_id,
            vendor_name,
            invoice_number_raw,
            invoice_number_norm,
            invoice_date,
            currency,
            total,
            tax_total,
            po_number,
            remit_account_hash,
            remit_account_masked,
            remit_name,
            pdf_hash,
            terms,
            payload_hash,
            payload_json,
            normalizer_version,
            created_at,
        )) = row
        else {
            return Ok(None);
        };

        Ok(Some(InvoiceRow {
            tenant_id,
            invoice_id,
            vendor_id,
            vendor_name,
            invoice_number_raw,
            invoice_number_norm,
            invoice_date: text_to_date(&invoice_date)?,
            currency,
            total: text_to_dec(&total)?,
            tax_total: text_opt_to_dec(tax_total)?,
            po_number,
            remit_account_hash,
            remit_account_masked,
            remit_name,
            pdf_hash,
            terms,
            payload_hash,
            payload_json,
            normalizer_version,
            created_at: text_to_dt(&created_at)?,
        }))
    }

    /// All other invoices for a vendor, used by the candidate retriever.
    pub async fn vendor_invoices(
        &self,
        tenant_id: &str,
        vendor_id: &str,
        exclude_invoice_id: &str,
    ) -> Result<Vec<InvoiceRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT tenant_id, invoice_id, vendor_id, vendor_name, invoice_number_raw,
                invoice_number_norm, invoice_date, currency, total, tax_total,
                po_number, remit_account_hash, remit_account_masked, remit_name,
                pdf_hash, terms, payload_hash, payload_json, normalizer_version, created_at
             FROM invoices WHERE tenant_id = ?1 AND vendor_id = ?2 AND invoice_id != ?3",
        )?;
        let rows = stmt.query_map(params![tenant_id, vendor_id, exclude_invoice_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
                r.get::<_, String>(7)?,
                r.get::<_, String>(8)?,
                r.get::<_, Option<String>>(9)?,
                r.get::<_, Option<String>>(10)?,
                r.get::<_, Option<String>>(11)?,
                r.get::<_, Option<String>>(12)?,
                r.get::<_, Option<String>>(13)?,
                r.get::<_, Option<String>>(14)?,
                r.get::<_, Option<String>>(15)?,
                r.get::<_, String>(16)?,
                r.get::<_, String>(17)?,
                r.get::<_, i64>(18)?,
                r.get::<_, String>(19)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (
                tenant_id,
                invoice_id,
                vendor_id,
                vendor_name,
                invoice_number_raw,
                invoice_number_norm,
                invoice_date,
                currency,
                total,
                tax_total,
                po_number,
                remit_account_hash,
                remit_account_masked,
                remit_name,
                pdf_hash,
                terms,
                payload_hash,
                payload_json,
                normalizer_version,
                created_at,
            ) = row?;
            out.push(InvoiceRow {
                tenant_id,
                invoice_id,
                vendor_id,
                vendor_name,
                invoice_number_raw,
                invoice_number_norm,
                invoice_date: text_to_date(&invoice_date)?,
                currency,
                total: text_to_dec(&total)?,
                tax_total: text_opt_to_dec(tax_total)?,
                po_number,
                remit_account_hash,
                remit_account_masked,
                remit_name,
                pdf_hash,
                terms,
                payload_hash,
                payload_json,
                normalizer_version,
                created_at: text_to_dt(&created_at)?,
            });
        }
        Ok(out)
    }

    pub async fn load_lines(&self, tenant_id: &str, invoice_id: &str) -> Result<Vec<LineRow>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT tenant_id, invoice_id, line_no, description, qty, unit_price, amount,
                sku, gl_code, cost_center
             FROM invoice_lines WHERE tenant_id = ?1 AND invoice_id = ?2 ORDER BY line_no ASC",
        )?;
        let rows = stmt.query_map(params![tenant_id, invoice_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
                r.get::<_, Option<String>>(7)?,
                r.get::<_, Option<String>>(8)?,
                r.get::<_, Option<String>>(9)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (tenant_id, invoice_id, line_no, description, qty, unit_price, amount, sku, gl_code, cost_center) =
                row?;
            out.push(LineRow {
                tenant_id,
                invoice_id,
                line_no,
                description,
                qty: text_to_dec(&qty)?,
                unit_price: text_to_dec(&unit_price)?,
                amount: text_to_dec(&amount)?,
                sku,
                gl_code,
                cost_center,
            });
        }
        Ok(out)
    }
}

/// Build the persisted row + lines from a validated `InvoiceIn`, without
/// writing anything. Kept here (not in `normalizer.rs`) because it reaches
/// into `Utc::now()` for `created_at`, the one non-pure field on the row.
pub fn build_invoice_row(
    tenant_id: &str,
    invoice: &crate::domain::InvoiceIn,
    invoice_number_norm: String,
    remit_account_hash: Option<String>,
    remit_account_masked: Option<String>,
    payload_hash: String,
    payload_json: String,
) -> InvoiceRow {
    InvoiceRow {
        tenant_id: tenant_id.to_string(),
        invoice_id: invoice.invoice_id.clone(),
        vendor_id: invoice.vendor_id.clone(),
        vendor_name: invoice.vendor_name.clone(),
        invoice_number_raw: invoice.invoice_number.clone(),
        invoice_number_norm,
        invoice_date: invoice.invoice_date,
        currency: invoice.currency.clone(),
        total: invoice.total,
        tax_total: invoice.tax_total,
        po_number: invoice.po_number.clone(),
        remit_account_hash,
        remit_account_masked,
        remit_name: invoice.remit_name.clone(),
        pdf_hash: invoice.pdf_hash.clone(),
        terms: invoice.terms.clone(),
        payload_hash,
        payload_json,
        normalizer_version: crate::normalizer::NORMALIZER_VERSION,
        created_at: Utc::now(),
    }
}

pub fn build_line_rows(tenant_id: &str, invoice_id: &str, invoice: &crate::domain::InvoiceIn) -> Vec<LineRow> {
    invoice
        .line_items
        .iter()
        .enumerate()
        .map(|(idx, l)| LineRow {
            tenant_id: tenant_id.to_string(),
            invoice_id: invoice_id.to_string(),
            line_no: (idx + 1) as i64,
            description: l.desc.clone(),
            qty: l.qty,
            unit_price: l.unit_price,
            amount: l.amount,
            sku: l.sku.clone(),
            gl_code: l.gl_code.clone(),
            cost_center: l.cost_center.clone(),
        })
        .collect()
}
