//! Text Indexer
//! Mission: write a normalized text blob per invoice so the optional
//! near-text retrieval path has something to search (spec.md §2, §4.3).
//! A dedicated search service is the real collaborator in production; this
//! table is the pluggable capability's default, in-process implementation.

use anyhow::Result;
use rusqlite::params;

use super::Store;

impl Store {
    pub async fn index_text_blob(
        &self,
        tenant_id: &str,
        invoice_id: &str,
        vendor_id: &str,
        blob: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO text_index (tenant_id, invoice_id, vendor_id, blob) VALUES (?1,?2,?3,?4)
             ON CONFLICT(tenant_id, invoice_id) DO UPDATE SET blob = excluded.blob",
            params![tenant_id, invoice_id, vendor_id, blob],
        )?;
        Ok(())
    }

    /// Crude near-text candidate lookup: shares at least one whitespace
    /// token with the query blob. Good enough to fill out the candidate set
    /// when structured blocking predicates fall short of the cap; a real
    /// deployment swaps this for a proper search index.
    pub async fn near_text_candidates(
        &self,
        tenant_id: &str,
        vendor_id: &str,
        exclude_invoice_id: &str,
        query_blob: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let token = query_blob
            .split_whitespace()
            .max_by_key(|t| t.len())
            .unwrap_or("");
        if token.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT invoice_id FROM text_index
             WHERE tenant_id = ?1 AND vendor_id = ?2 AND invoice_id != ?3 AND blob LIKE ?4
             LIMIT ?5",
        )?;
        let pattern = format!("%{token}%");
        let rows = stmt.query_map(
            params![tenant_id, vendor_id, exclude_invoice_id, pattern, limit as i64],
            |r| r.get::<_, String>(0),
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
