use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use crate::domain::{Decision, DecisionLabel, Explanation, TopMatch};
use crate::util::{dec_to_text, dt_to_text, text_to_dec, text_to_dt};

use super::Store;

/// Append-only. One active (most recent) decision per invoice is
/// determined by `created_at DESC` at read time, never by mutation.
pub(super) fn insert_decision_row(conn: &rusqlite::Connection, d: &Decision) -> Result<()> {
    conn.execute(
        "INSERT INTO decisions (
            tenant_id, decision_id, invoice_id, model_id, model_version, ruleset_version,
            risk_score, decision, reason_codes, top_matches, explanations, created_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        params![
            d.tenant_id,
            d.decision_id,
            d.invoice_id,
            d.model_id,
            d.model_version,
            d.ruleset_version,
            dec_to_text(d.risk_score),
            d.decision.as_str(),
            serde_json::to_string(&d.reason_codes)?,
            serde_json::to_string(&d.top_matches)?,
            serde_json::to_string(&d.explanations)?,
            dt_to_text(d.created_at),
        ],
    )?;
    Ok(())
}

impl Store {
    pub async fn persist_decision(&self, d: &Decision) -> Result<()> {
        let conn = self.conn.lock().await;
        insert_decision_row(&conn, d)
    }

    pub async fn load_latest_decision(
        &self,
        tenant_id: &str,
        invoice_id: &str,
    ) -> Result<Option<Decision>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT tenant_id, decision_id, invoice_id, model_id, model_version, ruleset_version,
                    risk_score, decision, reason_codes, top_matches, explanations, created_at
                 FROM decisions WHERE tenant_id = ?1 AND invoice_id = ?2
                 ORDER BY created_at DESC LIMIT 1",
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
                        r.get::<_, String>(9)?,
                        r.get::<_, String>(10)?,
                        r.get::<_, String>(11)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            tenant_id,
            decision_id,
            invoice_id,
            model_id,
            model_version,
            ruleset_version,
            risk_score,
            decision,
            reason_codes,
            top_matches,
            explanations,
            created_at,
        )) = row
        else {
            return Ok(None);
        };

        let reason_codes: Vec<String> = serde_json::from_str(&reason_codes)?;
        let top_matches: Vec<TopMatch> = serde_json::from_str(&top_matches)?;
        let explanations: Vec<Explanation> = serde_json::from_str(&explanations)?;

        Ok(Some(Decision {
            tenant_id,
            decision_id,
            invoice_id,
            model_id,
            model_version,
            ruleset_version,
            risk_score: text_to_dec(&risk_score)?,
            decision: DecisionLabel::from_str_opt(&decision)
                .ok_or_else(|| anyhow::anyhow!("corrupt decision label: {decision}"))?,
            reason_codes,
            top_matches,
            explanations,
            created_at: text_to_dt(&created_at)?,
        }))
    }
}
