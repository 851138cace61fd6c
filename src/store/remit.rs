use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::domain::RemitSighting;
use crate::util::{dt_to_text, text_to_dt};

use super::Store;

/// If absent, insert with `first_seen = last_seen = now`. If present,
/// refresh `last_seen`. Counts are monotonic non-decreasing by
/// construction: this never deletes a sighting.
pub(super) fn upsert_remit_row(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    vendor_id: &str,
    remit_account_hash: &str,
    remit_name: Option<&str>,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    let now = dt_to_text(now);
    conn.execute(
        "INSERT INTO remit_sightings (tenant_id, vendor_id, remit_account_hash, remit_name, first_seen, last_seen)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(tenant_id, vendor_id, remit_account_hash) DO UPDATE SET
            last_seen = excluded.last_seen,
            remit_name = COALESCE(excluded.remit_name, remit_sightings.remit_name)",
        params![tenant_id, vendor_id, remit_account_hash, remit_name, now],
    )?;
    Ok(())
}

impl Store {
    pub async fn upsert_remit_sighting(
        &self,
        tenant_id: &str,
        vendor_id: &str,
        remit_account_hash: &str,
        remit_name: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        upsert_remit_row(&conn, tenant_id, vendor_id, remit_account_hash, remit_name, Utc::now())
    }

    pub async fn find_remit_sighting(
        &self,
        tenant_id: &str,
        vendor_id: &str,
        remit_account_hash: &str,
    ) -> Result<Option<RemitSighting>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT tenant_id, vendor_id, remit_account_hash, remit_name, first_seen, last_seen
                 FROM remit_sightings
                 WHERE tenant_id = ?1 AND vendor_id = ?2 AND remit_account_hash = ?3",
                params![tenant_id, vendor_id, remit_account_hash],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, Option<String>>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(tenant_id, vendor_id, remit_account_hash, remit_name, first_seen, last_seen)| {
            Ok(RemitSighting {
                tenant_id,
                vendor_id,
                remit_account_hash,
                remit_name,
                first_seen: text_to_dt(&first_seen)?,
                last_seen: text_to_dt(&last_seen)?,
            })
        })
        .transpose()
    }
}
