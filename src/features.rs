//! Feature Engine
//! Mission: compute header, line-assignment, and text-similarity features
//! for one (query, candidate) invoice pair (spec.md §4.4). Pure, bounded,
//! deterministic — no I/O.

use std::collections::HashMap;

use chrono::Datelike;
use pathfinding::prelude::{kuhn_munkres_min, Matrix};
use rust_decimal::prelude::*;

use crate::domain::{InvoiceRow, LineRow};
use crate::normalizer::desc_norm;

/// Canonical, versioned feature ordering. Unknown names in a model artifact
/// are filled with 0 (spec.md §4.4).
pub const FEATURE_NAMES: [&str; 13] = [
    "abs_total_diff_pct",
    "days_diff",
    "same_po",
    "same_currency",
    "same_tax_total",
    "bank_change_flag",
    "payee_name_change_flag",
    "invnum_edit",
    "unmatched_amount_frac",
    "line_coverage_pct",
    "count_new_items",
    "median_unit_price_diff",
    "text_cosine",
];

pub type FeatureVector = HashMap<String, f64>;

/// Scaling applied before handing costs to the integer Kuhn-Munkres solver.
/// Large enough to preserve six decimal places of precision on costs that
/// are themselves bounded (each term capped at 5, weighted sum capped
/// below 10) without risking `i64` overflow across a 200x200 matrix.
const COST_SCALE: f64 = 1_000_000.0;

/// Larger than any achievable real cost (max real cost per cell is well
/// under 10.0 after weighting and clamping), so padding rows/columns are
/// only matched to each other or to real cells as an absolute last resort.
const SENTINEL_COST: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy)]
pub struct LineCostWeights {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn jaro_winkler(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b)
}

fn header_features(a: &InvoiceRow, b: &InvoiceRow) -> FeatureVector {
    let mut f = FeatureVector::new();

    let abs_total_diff_pct = (to_f64(a.total) - to_f64(b.total)).abs() / to_f64(a.total).abs().max(1.0);
    f.insert("abs_total_diff_pct".into(), abs_total_diff_pct);

    let days_diff = (a.invoice_date - b.invoice_date).num_days().unsigned_abs() as f64;
    f.insert("days_diff".into(), days_diff);

    let same_po = match (&a.po_number, &b.po_number) {
        (Some(x), Some(y)) if !x.is_empty() => (x == y) as i32 as f64,
        _ => 0.0,
    };
    f.insert("same_po".into(), same_po);

    f.insert("same_currency".into(), (a.currency == b.currency) as i32 as f64);

    let a_tax = a.tax_total.map(to_f64).unwrap_or(0.0);
    let b_tax = b.tax_total.map(to_f64).unwrap_or(0.0);
    let same_tax_total = ((a_tax * 100.0).round() == (b_tax * 100.0).round()) as i32 as f64;
    f.insert("same_tax_total".into(), same_tax_total);

    let bank_change_flag = (a.remit_account_hash != b.remit_account_hash) as i32 as f64;
    f.insert("bank_change_flag".into(), bank_change_flag);

    let a_name = a.remit_name.clone().unwrap_or_default();
    let b_name = b.remit_name.clone().unwrap_or_default();
    f.insert("payee_name_change_flag".into(), (a_name != b_name) as i32 as f64);

    let invnum_edit = 1.0 - jaro_winkler(&a.invoice_number_norm, &b.invoice_number_norm);
    f.insert("invnum_edit".into(), invnum_edit);

    f
}

struct Assignment {
    /// `matched[i] = Some(j)` when query line `i` is matched to candidate
    /// line `j`.
    matched: Vec<Option<usize>>,
}

fn solve_assignment(a: &[LineRow], b: &[LineRow], w: LineCostWeights) -> Assignment {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return Assignment {
            matched: vec![None; n],
        };
    }

    let size = n.max(m);
    let mut rows: Vec<Vec<i64>> = Vec::with_capacity(size);
    for i in 0..size {
        let mut row = Vec::with_capacity(size);
        for j in 0..size {
            let cost = if i < n && j < m {
                let desc_cost = w.alpha * (1.0 - jaro_winkler(&desc_norm(&a[i].description), &desc_norm(&b[j].description)));
                let price_cost = w.beta
                    * (to_f64(a[i].unit_price) - to_f64(b[j].unit_price)).abs()
                        / to_f64(a[i].unit_price).abs().max(1.0);
                let price_cost = price_cost.min(5.0 * w.beta);
                let qty_cost = w.gamma
                    * (to_f64(a[i].qty) - to_f64(b[j].qty)).abs() / to_f64(a[i].qty).abs().max(1.0);
                let qty_cost = qty_cost.min(5.0 * w.gamma);
                ((desc_cost + price_cost + qty_cost) * COST_SCALE).round() as i64
            } else {
                SENTINEL_COST
            };
            row.push(cost);
        }
        rows.push(row);
    }

    let matrix = Matrix::from_rows(rows).expect("square matrix by construction");
    let (_, assignment) = kuhn_munkres_min(&matrix);

    let mut matched = vec![None; n];
    for i in 0..n {
        let j = assignment[i];
        if j < m {
            matched[i] = Some(j);
        }
    }

    Assignment { matched }
}

fn line_features(a: &[LineRow], b: &[LineRow], w: LineCostWeights) -> FeatureVector {
    let mut f = FeatureVector::new();
    let n = a.len();

    let assignment = solve_assignment(a, b, w);

    let total_amount: f64 = a.iter().map(|l| to_f64(l.amount)).sum();
    let matched_amount: f64 = assignment
        .matched
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.map(|_| to_f64(a[i].amount)))
        .sum();

    let unmatched_amount_frac = (total_amount - matched_amount).max(0.0) / total_amount.max(1.0);
    f.insert("unmatched_amount_frac".into(), unmatched_amount_frac);
    f.insert("line_coverage_pct".into(), 1.0 - unmatched_amount_frac);

    let matched_count = assignment.matched.iter().filter(|m| m.is_some()).count();
    f.insert("count_new_items".into(), (n.saturating_sub(matched_count)) as f64);

    let mut price_diffs: Vec<f64> = assignment
        .matched
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.map(|j| (to_f64(a[i].unit_price) - to_f64(b[j].unit_price)).abs()))
        .collect();
    price_diffs.sort_by(|x, y| x.partial_cmp(y).unwrap());
    let median_unit_price_diff = if price_diffs.is_empty() {
        0.0
    } else {
        let mid = price_diffs.len() / 2;
        if price_diffs.len() % 2 == 0 {
            (price_diffs[mid - 1] + price_diffs[mid]) / 2.0
        } else {
            price_diffs[mid]
        }
    };
    f.insert("median_unit_price_diff".into(), median_unit_price_diff);

    f
}

fn char_trigrams(s: &str) -> std::collections::HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 3 {
        return std::collections::HashSet::from([s.to_string()]);
    }
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// Character-3-gram set-overlap proxy (spec.md §4.4, §9). Not true cosine
/// similarity: the denominator is total character length of both sides, not
/// the union size of the 3-gram sets. Retained as-is, deterministic in
/// [0, 1], named `text_cosine` for continuity with the source system.
fn text_cosine(a: &[LineRow], b: &[LineRow]) -> f64 {
    let a_text: String = a.iter().map(|l| desc_norm(&l.description)).collect::<Vec<_>>().join(" ");
    let b_text: String = b.iter().map(|l| desc_norm(&l.description)).collect::<Vec<_>>().join(" ");

    let a_grams = char_trigrams(&a_text);
    let b_grams = char_trigrams(&b_text);
    let overlap = a_grams.intersection(&b_grams).count() as f64;

    let denom = (a_text.chars().count() + b_text.chars().count()).max(1) as f64;
    (2.0 * overlap / denom).min(1.0)
}

pub fn compute_features(
    query: &InvoiceRow,
    query_lines: &[LineRow],
    candidate: &InvoiceRow,
    candidate_lines: &[LineRow],
    weights: LineCostWeights,
) -> FeatureVector {
    let mut f = header_features(query, candidate);
    f.extend(line_features(query_lines, candidate_lines, weights));
    f.insert("text_cosine".into(), text_cosine(query_lines, candidate_lines));
    f
}

/// Project a feature map onto the canonical ordering, filling unknown/
/// missing names with 0.
pub fn to_canonical_vector(features: &FeatureVector) -> [f64; 13] {
    let mut out = [0.0; 13];
    for (i, name) in FEATURE_NAMES.iter().enumerate() {
        out[i] = *features.get(*name).unwrap_or(&0.0);
    }
    out
}

/// Stable short digest of a feature vector for the decision's `top_matches`
/// payload; not a cryptographic commitment, just a deterministic summary.
pub fn feature_digest(features: &FeatureVector) -> String {
    let vec = to_canonical_vector(features);
    let joined = vec
        .iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(",");
    let mut hasher = sha2::Sha256::new();
    use sha2::Digest;
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn line(desc: &str, qty: i64, price: i64, amount: i64) -> LineRow {
        LineRow {
            tenant_id: "t1".into(),
            invoice_id: "inv".into(),
            line_no: 1,
            description: desc.into(),
            qty: Decimal::from(qty),
            unit_price: Decimal::from(price),
            amount: Decimal::from(amount),
            sku: None,
            gl_code: None,
            cost_center: None,
        }
    }

    fn default_weights() -> LineCostWeights {
        LineCostWeights {
            alpha: 0.7,
            beta: 0.2,
            gamma: 0.1,
        }
    }

    #[test]
    fn identical_lines_have_near_perfect_coverage() {
        let a = vec![line("paper a4", 10, 10, 100)];
        let b = vec![line("paper a4", 10, 10, 100)];
        let f = line_features(&a, &b, default_weights());
        assert!(f["line_coverage_pct"] >= 0.99);
        assert!(f["unmatched_amount_frac"] <= 0.01);
    }

    #[test]
    fn extra_query_line_counts_as_new_item() {
        let a = vec![line("paper a4", 10, 10, 100), line("stapler", 1, 5, 5)];
        let b = vec![line("paper a4", 10, 10, 100)];
        let f = line_features(&a, &b, default_weights());
        assert_eq!(f["count_new_items"], 1.0);
    }

    fn invoice(total: i64, date: (i32, u32, u32), po: Option<&str>) -> InvoiceRow {
        InvoiceRow {
            tenant_id: "t1".into(),
            invoice_id: "i".into(),
            vendor_id: "v".into(),
            vendor_name: "Acme".into(),
            invoice_number_raw: "1".into(),
            invoice_number_norm: "1".into(),
            invoice_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            currency: "USD".into(),
            total: Decimal::from(total),
            tax_total: None,
            po_number: po.map(|s| s.to_string()),
            remit_account_hash: None,
            remit_account_masked: None,
            remit_name: None,
            pdf_hash: None,
            terms: None,
            payload_hash: "x".into(),
            payload_json: "{}".into(),
            normalizer_version: 1,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn header_features_detect_same_po() {
        let a = invoice(100, (2026, 1, 1), Some("PO1"));
        let b = invoice(100, (2026, 1, 5), Some("PO1"));
        let f = header_features(&a, &b);
        assert_eq!(f["same_po"], 1.0);
        assert_eq!(f["days_diff"], 4.0);
    }

    #[test]
    fn canonical_vector_fills_missing_with_zero() {
        let mut f = FeatureVector::new();
        f.insert("same_po".into(), 1.0);
        let v = to_canonical_vector(&f);
        assert_eq!(v[FEATURE_NAMES.iter().position(|n| *n == "same_po").unwrap()], 1.0);
        assert_eq!(v[0], 0.0);
    }

    #[test]
    fn _dec_macro_is_available() {
        let _ = dec!(1.00);
    }
}
