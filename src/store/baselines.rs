use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use crate::domain::VendorBaseline;
use crate::util::{dt_to_text, text_to_dec, text_to_dt};

use super::Store;

impl Store {
    /// The externally-maintained baseline, if the batch collaborator has
    /// populated one (spec.md §3 "Vendor amount baseline").
    pub async fn load_vendor_baseline(
        &self,
        tenant_id: &str,
        vendor_id: &str,
    ) -> Result<Option<VendorBaseline>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT tenant_id, vendor_id, median, mad_like, sample_count, updated_at
                 FROM vendor_baselines WHERE tenant_id = ?1 AND vendor_id = ?2",
                params![tenant_id, vendor_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, i64>(4)?,
                        r.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(tenant_id, vendor_id, median, mad_like, sample_count, updated_at)| {
            Ok(VendorBaseline {
                tenant_id,
                vendor_id,
                median: text_to_dec(&median)?,
                mad_like: text_to_dec(&mad_like)?,
                sample_count,
                updated_at: text_to_dt(&updated_at)?,
            })
        })
        .transpose()
    }

    /// All historical totals for a vendor, used to derive a fallback
    /// baseline inline when none has been precomputed (spec.md §4.6).
    pub async fn vendor_totals(&self, tenant_id: &str, vendor_id: &str) -> Result<Vec<rust_decimal::Decimal>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT total FROM invoices WHERE tenant_id = ?1 AND vendor_id = ?2",
        )?;
        let rows = stmt.query_map(params![tenant_id, vendor_id], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(text_to_dec(&row?)?);
        }
        Ok(out)
    }

    #[cfg(test)]
    pub async fn upsert_vendor_baseline(&self, b: &VendorBaseline) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO vendor_baselines (tenant_id, vendor_id, median, mad_like, sample_count, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(tenant_id, vendor_id) DO UPDATE SET
                median = excluded.median, mad_like = excluded.mad_like,
                sample_count = excluded.sample_count, updated_at = excluded.updated_at",
            params![
                b.tenant_id,
                b.vendor_id,
                b.median.to_string(),
                b.mad_like.to_string(),
                b.sample_count,
                dt_to_text(b.updated_at),
            ],
        )?;
        Ok(())
    }
}
