//! Normalizer
//! Mission: deterministic, versioned field derivation. No I/O, no clocks.
//! Every function here must return byte-identical output for byte-identical
//! input across processes and machines (spec.md §4.1).

use sha2::{Digest, Sha256};

use crate::domain::InvoiceIn;

/// Bumped whenever any function in this module changes observable output.
pub const NORMALIZER_VERSION: i64 = 1;

const INVOICE_PREFIXES: &[&str] = &["INVOICE", "INV", "BILL"];

/// Uppercase, strip separators, drop a leading INV/INVOICE/BILL prefix,
/// strip leading zeros. Empty result becomes the literal "0".
pub fn invoice_number_norm(s: &str) -> String {
    let upper = s.to_uppercase();
    let stripped: String = upper
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '/'))
        .collect();

    let without_prefix = INVOICE_PREFIXES
        .iter()
        .find_map(|p| stripped.strip_prefix(p))
        .unwrap_or(&stripped);

    let trimmed = without_prefix.trim_start_matches('0');

    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercase, collapse non-alphanumerics to single spaces, trim.
pub fn desc_norm(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            out.push(c);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

/// Last-four-digits display mask. `None` in, `None` out.
pub fn mask_account_last4(s: Option<&str>) -> Option<String> {
    s.map(|raw| {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 4 {
            if digits.is_empty() {
                "****".to_string()
            } else {
                format!("****{digits}")
            }
        } else {
            format!("****{}", &digits[digits.len() - 4..])
        }
    })
}

/// One-way hash of the raw remit account string.
pub fn hash_account(s: Option<&str>) -> Option<String> {
    s.map(|raw| {
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        hex::encode(hasher.finalize())
    })
}

/// Lower-cased, space-joined concatenation used for the lightweight text
/// index / near-duplicate detection proxy.
pub fn text_blob(invoice: &InvoiceIn) -> String {
    let mut parts: Vec<String> = vec![invoice.vendor_name.clone()];
    if let Some(po) = &invoice.po_number {
        parts.push(po.clone());
    }
    if let Some(terms) = &invoice.terms {
        parts.push(terms.clone());
    }
    for line in &invoice.line_items {
        if let Some(sku) = &line.sku {
            parts.push(sku.clone());
        }
        parts.push(line.desc.clone());
    }
    parts.join(" ").to_lowercase()
}

/// Stable content hash over a canonical (sorted-key) serialization of the
/// input payload. Used as the idempotency key's content-address half.
pub fn payload_hash(invoice: &InvoiceIn) -> String {
    let canonical = canonical_json(invoice);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn canonical_json(invoice: &InvoiceIn) -> String {
    let value = serde_json::to_value(invoice).expect("InvoiceIn always serializes");
    let mut buf = String::new();
    write_canonical(&value, &mut buf);
    buf
}

fn write_canonical(value: &serde_json::Value, buf: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            buf.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str(&serde_json::to_string(k).unwrap());
                buf.push(':');
                write_canonical(&map[*k], buf);
            }
            buf.push('}');
        }
        serde_json::Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf);
            }
            buf.push(']');
        }
        other => buf.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invnum_norm_worked_examples() {
        assert_eq!(invoice_number_norm(" inv-000123 "), "123");
        assert_eq!(invoice_number_norm("invoice-001A"), "1A");
        assert_eq!(invoice_number_norm(""), "0");
    }

    #[test]
    fn invnum_norm_idempotent() {
        for s in [" inv-000123 ", "invoice-001A", "", "BILL/000", "XYZ-42"] {
            let once = invoice_number_norm(s);
            let twice = invoice_number_norm(&once);
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn desc_norm_worked_example() {
        assert_eq!(desc_norm("Printer Ink, Black!!!"), "printer ink black");
    }

    #[test]
    fn mask_account_handles_short_and_absent() {
        assert_eq!(mask_account_last4(None), None);
        assert_eq!(mask_account_last4(Some("ABC")), Some("****".to_string()));
        assert_eq!(
            mask_account_last4(Some("12")),
            Some("****12".to_string())
        );
        assert_eq!(
            mask_account_last4(Some("GB29-1234-5678")),
            Some("****5678".to_string())
        );
    }

    #[test]
    fn hash_account_deterministic() {
        let a = hash_account(Some("123456"));
        let b = hash_account(Some("123456"));
        assert_eq!(a, b);
        assert_ne!(hash_account(Some("123456")), hash_account(Some("654321")));
        assert_eq!(hash_account(None), None);
    }
}
