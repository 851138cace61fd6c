//! Anomaly Scorer
//! Mission: a vendor-scoped amount outlier score and a bank-change signal
//! (spec.md §4.6).

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use statrs::statistics::Data;
use statrs::statistics::OrderStatistics;

use crate::domain::{InvoiceRow, RemitSighting, VendorBaseline};
use crate::store::Store;

pub struct AnomalySignal {
    pub anom_prob: f64,
    pub reasons: Vec<String>,
    /// True iff the query's remit account has never been observed for this
    /// vendor before. Distinct from the rule engine's lookback-windowed
    /// check (spec.md §4.7), which also treats a long-dormant account as a
    /// bank change.
    pub bank_change_new: bool,
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// `PERCENTILE_CONT(0.5) OVER ABS(total)`, not a true median absolute
/// deviation (spec.md §9 "suspected source defect", retained as-is under
/// the same name).
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut data = Data::new(values.to_vec());
    data.percentile(50)
}

async fn resolve_baseline(store: &Store, tenant_id: &str, vendor_id: &str) -> anyhow::Result<(f64, f64)> {
    if let Some(VendorBaseline { median, mad_like, .. }) =
        store.load_vendor_baseline(tenant_id, vendor_id).await?
    {
        let mad = to_f64(mad_like);
        let mad = if mad == 0.0 { to_f64(median).abs().max(1.0) } else { mad };
        return Ok((to_f64(median), mad));
    }

    let totals: Vec<f64> = store
        .vendor_totals(tenant_id, vendor_id)
        .await?
        .into_iter()
        .map(to_f64)
        .collect();

    if totals.is_empty() {
        return Ok((0.0, 1.0));
    }

    let med = median(&totals);
    let abs_totals: Vec<f64> = totals.iter().map(|t| t.abs()).collect();
    let mad_like = median(&abs_totals);
    let mad_like = if mad_like == 0.0 { med.abs().max(1.0) } else { mad_like };
    Ok((med, mad_like))
}

fn sighting_is_absent(sighting: &Option<RemitSighting>) -> bool {
    sighting.is_none()
}

pub async fn score_anomaly(
    store: &Store,
    query: &InvoiceRow,
    outlier_z_threshold: f64,
) -> anyhow::Result<AnomalySignal> {
    let (median, mad) = resolve_baseline(store, &query.tenant_id, &query.vendor_id).await?;
    let z = (to_f64(query.total) - median).abs() / mad.max(1.0);
    let mut amount_score = (z / 10.0).min(1.0);

    let mut reasons = Vec::new();
    if z >= outlier_z_threshold {
        reasons.push("AMOUNT_OUTLIER".to_string());
    }

    let mut bank_change_new = false;
    if let Some(hash) = &query.remit_account_hash {
        let sighting = store
            .find_remit_sighting(&query.tenant_id, &query.vendor_id, hash)
            .await?;
        if sighting_is_absent(&sighting) {
            bank_change_new = true;
            reasons.push("BANK_CHANGE".to_string());
            amount_score = amount_score.max(0.6);
        }
    }

    Ok(AnomalySignal {
        anom_prob: amount_score,
        reasons,
        bank_change_new,
    })
}

/// Whether `sighting` counts as "unseen within the lookback window", for
/// the rule engine's stricter check (spec.md §4.7).
pub fn unseen_within_lookback(
    sighting: &Option<RemitSighting>,
    now: DateTime<Utc>,
    lookback_months: i64,
) -> bool {
    match sighting {
        None => true,
        Some(s) => {
            let cutoff = now - chrono::Duration::days(lookback_months * 30);
            s.last_seen < cutoff
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_empty_is_zero() {
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn median_of_odd_set() {
        assert_eq!(median(&[1.0, 3.0, 2.0]), 2.0);
    }

    #[test]
    fn no_sighting_means_unseen() {
        assert!(unseen_within_lookback(&None, Utc::now(), 12));
    }

    #[test]
    fn recent_sighting_is_not_unseen() {
        let s = RemitSighting {
            tenant_id: "t".into(),
            vendor_id: "v".into(),
            remit_account_hash: "h".into(),
            remit_name: None,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        };
        assert!(!unseen_within_lookback(&Some(s), Utc::now(), 12));
    }
}
