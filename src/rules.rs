//! Rule Engine
//! Mission: mandatory, explainable overrides that force a floor on the
//! decision regardless of the fused score (spec.md §4.7).

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;

use crate::anomaly_scorer::unseen_within_lookback;
use crate::domain::{DecisionLabel, InvoiceRow, RemitSighting};

pub struct RuleHit {
    pub label: DecisionLabel,
    pub reason: String,
}

/// `|a.total - b.total| / max(|a.total|, 1)` per spec.md §4.4, with the
/// query as `a` — matches `features.rs`'s `abs_total_diff_pct` feature.
fn abs_total_diff_pct(query: &InvoiceRow, candidate: &InvoiceRow) -> f64 {
    let q = query.total.to_f64().unwrap_or(0.0);
    let c = candidate.total.to_f64().unwrap_or(0.0);
    let denom = q.abs().max(1.0);
    (q - c).abs() / denom
}

pub struct RuleThresholds {
    pub same_po_total_tol: f64,
    pub same_po_window_days: i64,
    pub bank_change_lookback_months: i64,
}

/// Evaluates the mandatory rules against the query and its top-ranked
/// candidate, returning every rule that fired. `sighting` is the remit
/// sighting for the query's account hash as it stood *before* this
/// request's own upsert (spec.md §4.11 step 1 ordering).
pub fn evaluate(
    query: &InvoiceRow,
    top_candidate: Option<&InvoiceRow>,
    sighting: &Option<RemitSighting>,
    now: DateTime<Utc>,
    thresholds: &RuleThresholds,
) -> Vec<RuleHit> {
    let mut hits = Vec::new();

    if let Some(candidate) = top_candidate {
        if !candidate.invoice_number_norm.is_empty()
            && candidate.invoice_number_norm == query.invoice_number_norm
        {
            hits.push(RuleHit {
                label: DecisionLabel::Hold,
                reason: "EXACT_INVNUM".to_string(),
            });
        }

        let same_po = match (&query.po_number, &candidate.po_number) {
            (Some(a), Some(b)) => !a.is_empty() && a == b,
            _ => false,
        };
        let days_diff = (query.invoice_date - candidate.invoice_date).num_days().unsigned_abs() as i64;
        if same_po
            && abs_total_diff_pct(query, candidate) <= thresholds.same_po_total_tol
            && days_diff <= thresholds.same_po_window_days
        {
            hits.push(RuleHit {
                label: DecisionLabel::Hold,
                reason: "SAME_PO_NEAR_TOTAL".to_string(),
            });
        }

        if let (Some(qh), Some(ch)) = (&query.pdf_hash, &candidate.pdf_hash) {
            if qh == ch {
                hits.push(RuleHit {
                    label: DecisionLabel::Hold,
                    reason: "PDF_NEAR_DUP".to_string(),
                });
            }
        }
    }

    if query.remit_account_hash.is_some()
        && unseen_within_lookback(sighting, now, thresholds.bank_change_lookback_months)
    {
        hits.push(RuleHit {
            label: DecisionLabel::Review,
            reason: "BANK_CHANGE".to_string(),
        });
    }

    hits
}

/// Folds every rule hit into a single floor label plus a de-duplicated,
/// first-occurrence-ordered reason list.
pub fn fold(hits: &[RuleHit]) -> (DecisionLabel, Vec<String>) {
    let mut label = DecisionLabel::Pass;
    let mut reasons = Vec::new();
    for hit in hits {
        label = label.strictest(hit.label.clone());
        if !reasons.contains(&hit.reason) {
            reasons.push(hit.reason.clone());
        }
    }
    (label, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn thresholds() -> RuleThresholds {
        RuleThresholds {
            same_po_total_tol: 0.005,
            same_po_window_days: 30,
            bank_change_lookback_months: 12,
        }
    }

    fn row(invoice_id: &str, invnum_norm: &str, po: Option<&str>, total: &str, pdf: Option<&str>) -> InvoiceRow {
        InvoiceRow {
            tenant_id: "t1".into(),
            invoice_id: invoice_id.into(),
            vendor_id: "v1".into(),
            vendor_name: "Acme".into(),
            invoice_number_raw: invnum_norm.into(),
            invoice_number_norm: invnum_norm.into(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            currency: "USD".into(),
            total: Decimal::from_str(total).unwrap(),
            tax_total: None,
            po_number: po.map(|s| s.to_string()),
            remit_account_hash: None,
            remit_account_masked: None,
            remit_name: None,
            pdf_hash: pdf.map(|s| s.to_string()),
            terms: None,
            payload_hash: "h".into(),
            payload_json: "{}".into(),
            normalizer_version: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn exact_invnum_forces_hold() {
        let query = row("q", "INV-100", None, "100.00", None);
        let cand = row("c", "INV-100", None, "100.00", None);
        let hits = evaluate(&query, Some(&cand), &None, Utc::now(), &thresholds());
        let (label, reasons) = fold(&hits);
        assert_eq!(label, DecisionLabel::Hold);
        assert!(reasons.contains(&"EXACT_INVNUM".to_string()));
    }

    #[test]
    fn same_po_out_of_tolerance_does_not_fire() {
        let query = row("q", "INV-200", Some("PO-1"), "1000.00", None);
        let cand = row("c", "INV-999", Some("PO-1"), "500.00", None);
        let hits = evaluate(&query, Some(&cand), &None, Utc::now(), &thresholds());
        assert!(!hits.iter().any(|h| h.reason == "SAME_PO_NEAR_TOTAL"));
    }

    #[test]
    fn same_po_near_total_forces_hold() {
        let query = row("q", "INV-200", Some("PO-1"), "1000.00", None);
        let cand = row("c", "INV-999", Some("PO-1"), "1005.00", None);
        let hits = evaluate(&query, Some(&cand), &None, Utc::now(), &thresholds());
        let (label, reasons) = fold(&hits);
        assert_eq!(label, DecisionLabel::Hold);
        assert!(reasons.contains(&"SAME_PO_NEAR_TOTAL".to_string()));
    }

    #[test]
    fn total_diff_pct_denominator_matches_query_total_not_the_max() {
        // diff=5.02: 5.02/query_total(1000)=0.502% clears the 0.5%
        // tolerance, but 5.02/max(1000,1005.02)=0.4995% would not — picked
        // so the two denominators land on opposite sides of the tolerance,
        // pinning which one the rule actually uses.
        let query = row("q", "INV-1", Some("PO-1"), "1000.00", None);
        let cand = row("c", "INV-2", Some("PO-1"), "1005.02", None);
        let hits = evaluate(&query, Some(&cand), &None, Utc::now(), &thresholds());
        assert!(!hits.iter().any(|h| h.reason == "SAME_PO_NEAR_TOTAL"));
    }

    #[test]
    fn no_sighting_forces_bank_change_review() {
        let query = InvoiceRow {
            remit_account_hash: Some("h1".into()),
            ..row("q", "INV-1", None, "10.00", None)
        };
        let hits = evaluate(&query, None, &None, Utc::now(), &thresholds());
        let (label, reasons) = fold(&hits);
        assert_eq!(label, DecisionLabel::Review);
        assert!(reasons.contains(&"BANK_CHANGE".to_string()));
    }
}
