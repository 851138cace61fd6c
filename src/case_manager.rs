//! Case Manager
//! Mission: open or refresh a review case whenever a decision is HOLD or
//! REVIEW, leave PASS alone, and never clobber a disposition once it has
//! been recorded (spec.md §4.9).

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{Case, CaseStatus, DecisionLabel};
use crate::store::Store;

const SLA_HOURS: i64 = 48;

/// Builds the case a decision should open or refresh, without writing
/// anything. `None` when the decision is PASS — callers must leave any
/// existing case untouched in that case.
pub fn candidate_case(tenant_id: &str, invoice_id: &str, decision: &DecisionLabel, now: DateTime<Utc>) -> Option<Case> {
    if *decision == DecisionLabel::Pass {
        return None;
    }

    Some(Case {
        tenant_id: tenant_id.to_string(),
        case_id: Uuid::new_v4().to_string(),
        invoice_id: invoice_id.to_string(),
        status: CaseStatus::Open,
        sla_due: now + Duration::hours(SLA_HOURS),
        disposition: None,
    })
}

/// `None` when the decision was PASS and no case was touched.
pub async fn handle_decision(
    store: &Store,
    tenant_id: &str,
    invoice_id: &str,
    decision: &DecisionLabel,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<Case>> {
    let Some(case) = candidate_case(tenant_id, invoice_id, decision, now) else {
        return Ok(None);
    };

    store.upsert_case(&case).await?;
    store.find_open_case(tenant_id, invoice_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pass_does_not_open_a_case() {
        let store = Store::open_in_memory().unwrap();
        let result = handle_decision(&store, "t1", "inv-1", &DecisionLabel::Pass, Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.find_open_case("t1", "inv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hold_opens_a_case_with_48h_sla() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let case = handle_decision(&store, "t1", "inv-1", &DecisionLabel::Hold, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(case.status, CaseStatus::Open);
        assert!((case.sla_due - now).num_hours() >= SLA_HOURS - 1);
    }

    #[tokio::test]
    async fn repeated_hold_refreshes_rather_than_duplicates() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        handle_decision(&store, "t1", "inv-1", &DecisionLabel::Hold, now)
            .await
            .unwrap();
        let later = now + Duration::hours(1);
        let refreshed = handle_decision(&store, "t1", "inv-1", &DecisionLabel::Hold, later)
            .await
            .unwrap()
            .unwrap();
        assert!(refreshed.sla_due > now + Duration::hours(SLA_HOURS));
    }

    #[tokio::test]
    async fn disposition_survives_a_later_refresh() {
        use crate::domain::Disposition;

        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let case = handle_decision(&store, "t1", "inv-1", &DecisionLabel::Hold, now)
            .await
            .unwrap()
            .unwrap();

        store
            .dispose_case(
                "t1",
                &case.case_id,
                &Disposition {
                    user: "reviewer@example.com".into(),
                    timestamp: now,
                    label: "CONFIRMED_DUP".into(),
                    notes: None,
                },
            )
            .await
            .unwrap();

        // A later HOLD on the same invoice opens a fresh case since the
        // prior one is now closed; the closed case's disposition must not
        // be touched by anything in this module.
        handle_decision(&store, "t1", "inv-1", &DecisionLabel::Hold, now + Duration::hours(2))
            .await
            .unwrap();

        assert!(store.find_open_case("t1", "inv-1").await.unwrap().is_some());
    }
}
