//! Scoring Orchestrator
//! Mission: drive one `/scoreInvoice` request end to end — normalize,
//! persist, retrieve candidates, score, decide, and record — within the
//! per-request deadline (spec.md §4.11, §5).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rayon::prelude::*;
use rust_decimal::prelude::*;
use uuid::Uuid;

use crate::anomaly_scorer::{self, AnomalySignal};
use crate::case_manager;
use crate::config::{Config, ThresholdStore};
use crate::decision_engine::{self, FusionInput};
use crate::domain::{Decision, DecisionLabel, Explanation, InvoiceIn, TopMatch};
use crate::duplicate_scorer::DuplicateScorer;
use crate::features::{self, FeatureVector, LineCostWeights};
use crate::normalizer;
use crate::retriever;
use crate::rules;
use crate::store::invoices::{build_invoice_row, build_line_rows};
use crate::store::Store;
use crate::validation;

pub struct Orchestrator {
    pub store: Store,
    pub thresholds: Arc<ThresholdStore>,
    pub scorer: Arc<dyn DuplicateScorer>,
    pub config: Config,
}

pub struct ScoreOutcome {
    pub decision: Decision,
    pub case_id: Option<String>,
    pub is_resubmission: bool,
}

struct CandidateScore {
    candidate_id: String,
    similarity: f64,
    features: FeatureVector,
}

impl Orchestrator {
    pub async fn score_invoice(&self, tenant_id: &str, invoice: InvoiceIn) -> anyhow::Result<ScoreOutcome> {
        tokio::time::timeout(
            Duration::from_millis(self.config.request_timeout_ms),
            self.score_invoice_inner(tenant_id, invoice),
        )
        .await
        .map_err(|_| anyhow::anyhow!("scoring deadline exceeded"))?
    }

    async fn score_invoice_inner(&self, tenant_id: &str, invoice: InvoiceIn) -> anyhow::Result<ScoreOutcome> {
        let now = Utc::now();

        if let Some(decision) = self.store.load_latest_decision(tenant_id, &invoice.invoice_id).await? {
            return Ok(ScoreOutcome {
                decision,
                case_id: self
                    .store
                    .find_open_case(tenant_id, &invoice.invoice_id)
                    .await?
                    .map(|c| c.case_id),
                is_resubmission: true,
            });
        }

        let data_quality_fail = validation::check_data_quality(&invoice, validation::today());

        let invoice_number_norm = normalizer::invoice_number_norm(&invoice.invoice_number);
        let remit_account_hash = normalizer::hash_account(invoice.remit_account.as_deref());
        let remit_account_masked = normalizer::mask_account_last4(invoice.remit_account.as_deref());
        let payload_hash = normalizer::payload_hash(&invoice);
        let payload_json = serde_json::to_string(&invoice)?;

        let row = build_invoice_row(
            tenant_id,
            &invoice,
            invoice_number_norm,
            remit_account_hash.clone(),
            remit_account_masked,
            payload_hash,
            payload_json,
        );
        let lines = build_line_rows(tenant_id, &invoice.invoice_id, &invoice);

        let sighting_before = match &remit_account_hash {
            Some(hash) => self.store.find_remit_sighting(tenant_id, &row.vendor_id, hash).await?,
            None => None,
        };

        // Computed against the corpus as it stood before this request's own
        // writes land, so the vendor baseline and bank-change check are
        // never self-polluted by the invoice being scored.
        let AnomalySignal {
            anom_prob,
            reasons: anomaly_reasons,
            bank_change_new,
        } = anomaly_scorer::score_anomaly(&self.store, &row, 6.0).await?;

        self.store
            .persist_invoice_snapshot(&row, &lines, remit_account_hash.as_deref(), row.remit_name.as_deref())
            .await?;

        let blob = normalizer::text_blob(&invoice);
        if let Err(err) = self
            .store
            .index_text_blob(tenant_id, &row.invoice_id, &row.vendor_id, &blob)
            .await
        {
            tracing::warn!(error = %err, invoice_id = %row.invoice_id, "text index write failed, continuing");
        }

        let candidates = retriever::retrieve_candidates(&self.store, &row, self.config.candidate_cap).await?;

        let weights = LineCostWeights {
            alpha: self.config.line_cost_alpha,
            beta: self.config.line_cost_beta,
            gamma: self.config.line_cost_gamma,
        };

        let mut candidate_lines = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let cl = self.store.load_lines(tenant_id, &candidate.invoice_id).await?;
            candidate_lines.push(cl);
        }

        let scorer = self.scorer.clone();
        let mut ranked: Vec<CandidateScore> = candidates
            .par_iter()
            .zip(candidate_lines.par_iter())
            .map(|(candidate, cand_lines)| {
                let f = features::compute_features(&row, &lines, candidate, cand_lines, weights);
                let similarity = scorer.predict_dup_prob(&f);
                CandidateScore {
                    candidate_id: candidate.invoice_id.clone(),
                    similarity,
                    features: f,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });

        let top3: Vec<&CandidateScore> = ranked.iter().take(3).collect();

        let top_candidate_row = top3
            .first()
            .and_then(|top| candidates.iter().find(|c| c.invoice_id == top.candidate_id));

        let dup_prob = top3.first().map(|c| c.similarity).unwrap_or(0.0);
        let text_dup_prob = top3
            .first()
            .map(|c| c.features.get("text_cosine").copied().unwrap_or(0.0))
            .unwrap_or(0.0);

        let rule_thresholds = rules::RuleThresholds {
            same_po_total_tol: self.config.same_po_total_tol,
            same_po_window_days: self.config.same_po_window_days,
            bank_change_lookback_months: self.config.bank_change_lookback_months,
        };
        let rule_hits = rules::evaluate(&row, top_candidate_row, &sighting_before, now, &rule_thresholds);
        let (rule_floor, rule_reasons) = rules::fold(&rule_hits);

        let fused = decision_engine::fuse(&FusionInput {
            dup_prob,
            anom_prob,
            text_dup_prob,
            bank_change: bank_change_new,
        });

        let thresholds = self.thresholds.thresholds_for(tenant_id, &row.vendor_id);
        let score_label = decision_engine::label_from_score(fused.risk_score, thresholds);
        let rule_floor = if data_quality_fail {
            rule_floor.strictest(DecisionLabel::Review)
        } else {
            rule_floor
        };
        let decision_label = decision_engine::final_decision(score_label, rule_floor);

        let mut reason_codes = rule_reasons;
        if data_quality_fail {
            reason_codes.push("DATA_QUALITY_CHECK_FAIL".to_string());
        }
        for r in anomaly_reasons {
            if !reason_codes.contains(&r) {
                reason_codes.push(r);
            }
        }

        let top_matches: Vec<TopMatch> = top3
            .iter()
            .map(|c| TopMatch {
                invoice_id: c.candidate_id.clone(),
                similarity: c.similarity,
                feature_digest: features::feature_digest(&c.features),
            })
            .collect();

        let explanations: Vec<Explanation> = top3
            .first()
            .map(|c| {
                features::FEATURE_NAMES
                    .iter()
                    .map(|name| Explanation {
                        feature: name.to_string(),
                        value: c.features.get(*name).copied().unwrap_or(0.0),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let decision = Decision {
            tenant_id: tenant_id.to_string(),
            decision_id: Uuid::new_v4().to_string(),
            invoice_id: row.invoice_id.clone(),
            model_id: self.scorer.model_id().to_string(),
            model_version: self.scorer.model_version().to_string(),
            ruleset_version: self.config.ruleset_version.clone(),
            risk_score: fused.risk_score,
            decision: decision_label.clone(),
            reason_codes,
            top_matches,
            explanations,
            created_at: now,
        };

        let candidate_case = case_manager::candidate_case(tenant_id, &row.invoice_id, &decision_label, now);

        let case = self
            .store
            .persist_outcome(
                &decision,
                candidate_case.as_ref(),
                &crate::domain::AuditEntry {
                    tenant_id: tenant_id.to_string(),
                    actor: "system".to_string(),
                    action: "score".to_string(),
                    entity: "invoice".to_string(),
                    entity_id: row.invoice_id.clone(),
                    payload: serde_json::to_string(&decision.reason_codes)?,
                    created_at: now,
                },
            )
            .await?;

        Ok(ScoreOutcome {
            decision,
            case_id: case.map(|c| c.case_id),
            is_resubmission: false,
        })
    }
}
