//! Candidate Retriever
//! Mission: return up to `candidate_cap` historical invoices for the same
//! vendor that plausibly duplicate the query invoice (spec.md §4.3).

use std::collections::HashSet;

use anyhow::Result;
use chrono::Datelike;
use rust_decimal::prelude::*;

use crate::domain::InvoiceRow;
use crate::store::Store;

/// Candidate predicate that qualified a row, used only to bucket rows into
/// the priority order spec.md §4.3 requires; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchKind {
    ExactInvoiceNumber = 0,
    SamePo = 1,
    AmountAndMonth = 2,
    RemitAccount = 3,
}

fn round2(d: Decimal) -> Decimal {
    d.round_dp(2)
}

fn qualifies(query: &InvoiceRow, candidate: &InvoiceRow) -> Option<MatchKind> {
    if !candidate.invoice_number_norm.is_empty()
        && candidate.invoice_number_norm == query.invoice_number_norm
    {
        return Some(MatchKind::ExactInvoiceNumber);
    }
    if let (Some(qpo), Some(cpo)) = (&query.po_number, &candidate.po_number) {
        if qpo == cpo && !qpo.is_empty() {
            return Some(MatchKind::SamePo);
        }
    }
    if round2(query.total) == round2(candidate.total)
        && query.invoice_date.year() == candidate.invoice_date.year()
        && query.invoice_date.month() == candidate.invoice_date.month()
    {
        return Some(MatchKind::AmountAndMonth);
    }
    if let (Some(qh), Some(ch)) = (&query.remit_account_hash, &candidate.remit_account_hash) {
        if qh == ch {
            return Some(MatchKind::RemitAccount);
        }
    }
    None
}

/// Retrieve up to `cap` candidates for `query`, same vendor, excluding
/// itself. Structured predicates first, in priority order; the optional
/// near-text path fills remaining slots and is skipped silently on failure.
pub async fn retrieve_candidates(
    store: &Store,
    query: &InvoiceRow,
    cap: usize,
) -> Result<Vec<InvoiceRow>> {
    let all_vendor_rows = store
        .vendor_invoices(&query.tenant_id, &query.vendor_id, &query.invoice_id)
        .await?;

    let mut structured: Vec<(MatchKind, InvoiceRow)> = all_vendor_rows
        .into_iter()
        .filter_map(|row| qualifies(query, &row).map(|kind| (kind, row)))
        .collect();

    structured.sort_by(|(ka, a), (kb, b)| ka.cmp(kb).then(b.invoice_date.cmp(&a.invoice_date)));

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<InvoiceRow> = Vec::new();
    for (_, row) in structured {
        if seen.insert(row.invoice_id.clone()) {
            out.push(row);
            if out.len() >= cap {
                return Ok(out);
            }
        }
    }

    if out.len() < cap {
        let blob = crate::normalizer::text_blob(&crate::domain::InvoiceIn {
            invoice_id: query.invoice_id.clone(),
            vendor_id: query.vendor_id.clone(),
            vendor_name: query.vendor_name.clone(),
            invoice_number: query.invoice_number_raw.clone(),
            invoice_date: query.invoice_date,
            currency: query.currency.clone(),
            total: query.total,
            tax_total: query.tax_total,
            po_number: query.po_number.clone(),
            remit_account: None,
            remit_name: query.remit_name.clone(),
            pdf_hash: query.pdf_hash.clone(),
            terms: query.terms.clone(),
            line_items: Vec::new(),
        });

        let remaining = cap - out.len();
        match store
            .near_text_candidates(&query.tenant_id, &query.vendor_id, &query.invoice_id, &blob, remaining * 4)
            .await
        {
            Ok(ids) => {
                for id in ids {
                    if out.len() >= cap {
                        break;
                    }
                    if !seen.insert(id.clone()) {
                        continue;
                    }
                    if let Some(row) = store.load_invoice_row(&query.tenant_id, &id).await? {
                        out.push(row);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "near-text retrieval degraded, skipping");
            }
        }
    }

    Ok(out)
}
