//! Schema & Data-Quality Validation
//! Mission: reject malformed payloads before any write (spec.md §7 "Schema
//! violation"), and flag suspicious-but-processable ones so the decision
//! engine can bias toward REVIEW instead (spec.md §7 "Data-quality
//! warning").

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::*;

use crate::domain::InvoiceIn;
use crate::error::AppError;

const LINE_SUM_TOLERANCE_PCT: f64 = 0.01;
const MAX_FUTURE_DAYS: i64 = 7;
const MAX_PAST_YEARS: i64 = 10;

/// Hard failures: missing/empty required fields, malformed currency. No
/// snapshot is written when this returns `Err`.
pub fn validate_schema(invoice: &InvoiceIn) -> Result<(), AppError> {
    if invoice.invoice_id.trim().is_empty() {
        return Err(AppError::Schema("invoice_id is required".into()));
    }
    if invoice.vendor_id.trim().is_empty() {
        return Err(AppError::Schema("vendor_id is required".into()));
    }
    if invoice.invoice_number.trim().is_empty() {
        return Err(AppError::Schema("invoice_number is required".into()));
    }
    if invoice.currency.len() != 3 || !invoice.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Schema(format!(
            "currency must be a 3-letter ISO-4217 code, got {:?}",
            invoice.currency
        )));
    }
    if invoice.line_items.is_empty() {
        return Err(AppError::Schema("line_items must be non-empty".into()));
    }
    for (i, line) in invoice.line_items.iter().enumerate() {
        if line.desc.trim().is_empty() {
            return Err(AppError::Schema(format!("line_items[{i}].desc is required")));
        }
        if line.qty <= Decimal::ZERO {
            return Err(AppError::Schema(format!("line_items[{i}].qty must be positive")));
        }
    }
    Ok(())
}

/// Soft failures: proceed with scoring but append `DATA_QUALITY_CHECK_FAIL`
/// and bias the decision toward REVIEW.
pub fn check_data_quality(invoice: &InvoiceIn, today: NaiveDate) -> bool {
    let line_sum: Decimal = invoice.line_items.iter().map(|l| l.amount).sum();
    let header_total = invoice.total;
    let denom = header_total.abs().max(Decimal::ONE);
    let diff_pct = ((line_sum - header_total).abs() / denom).to_f64().unwrap_or(1.0);
    let line_sum_mismatch = diff_pct > LINE_SUM_TOLERANCE_PCT;

    let implausible_date = invoice.invoice_date > today + Duration::days(MAX_FUTURE_DAYS)
        || invoice.invoice_date < today - Duration::days(365 * MAX_PAST_YEARS);

    line_sum_mismatch || implausible_date
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line_items_invoice(total: Decimal, line_amount: Decimal, date: NaiveDate) -> InvoiceIn {
        InvoiceIn {
            invoice_id: "inv-1".into(),
            vendor_id: "v1".into(),
            vendor_name: "Acme".into(),
            invoice_number: "INV-1".into(),
            invoice_date: date,
            currency: "USD".into(),
            total,
            tax_total: None,
            po_number: None,
            remit_account: None,
            remit_name: None,
            pdf_hash: None,
            terms: None,
            line_items: vec![crate::domain::LineItemIn {
                desc: "paper".into(),
                qty: dec!(1),
                unit_price: line_amount,
                amount: line_amount,
                sku: None,
                gl_code: None,
                cost_center: None,
            }],
        }
    }

    #[test]
    fn rejects_empty_line_items() {
        let mut invoice = line_items_invoice(dec!(100), dec!(100), today());
        invoice.line_items.clear();
        assert!(validate_schema(&invoice).is_err());
    }

    #[test]
    fn rejects_bad_currency() {
        let mut invoice = line_items_invoice(dec!(100), dec!(100), today());
        invoice.currency = "US".into();
        assert!(validate_schema(&invoice).is_err());
    }

    #[test]
    fn accepts_well_formed_invoice() {
        let invoice = line_items_invoice(dec!(100), dec!(100), today());
        assert!(validate_schema(&invoice).is_ok());
    }

    #[test]
    fn flags_line_sum_mismatch() {
        let invoice = line_items_invoice(dec!(100), dec!(50), today());
        assert!(check_data_quality(&invoice, today()));
    }

    #[test]
    fn flags_implausible_future_date() {
        let invoice = line_items_invoice(dec!(100), dec!(100), today() + Duration::days(365));
        assert!(check_data_quality(&invoice, today()));
    }

    #[test]
    fn clean_invoice_passes_data_quality() {
        let invoice = line_items_invoice(dec!(100), dec!(100), today());
        assert!(!check_data_quality(&invoice, today()));
    }
}
