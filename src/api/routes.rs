//! API Routes
//! Mission: wire `/scoreInvoice`, `/invoice/{invoice_id}/decision`, and
//! `/health` to the scoring orchestrator (spec.md §6). `/invoice/{id}/case/dispose`
//! is an added surface for the `disposition` audit action named in spec.md
//! §4.10 — the spec names the action but never names the endpoint that
//! triggers it.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::Claims;
use crate::api::models::{DispositionRequest, ExplanationOut, InvoiceIn, ScoreInvoiceResponse, TopMatchOut};
use crate::domain::{Decision, Disposition};
use crate::error::{AppError, AppResult};
use crate::orchestrator::Orchestrator;
use crate::validation;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/scoreInvoice", post(score_invoice))
        .route("/invoice/:invoice_id/decision", get(get_decision))
        .route("/invoice/:invoice_id/case/dispose", post(dispose_case))
        .with_state(state)
}

pub fn health_router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn decision_to_response(decision: Decision) -> ScoreInvoiceResponse {
    ScoreInvoiceResponse {
        risk_score: decision.risk_score.to_string().parse().unwrap_or(0.0),
        decision: decision.decision.as_str().to_string(),
        reason_codes: decision.reason_codes,
        top_matches: decision
            .top_matches
            .into_iter()
            .map(|m| TopMatchOut {
                invoice_id: m.invoice_id,
                similarity: m.similarity,
                features: m.feature_digest,
            })
            .collect(),
        explanations: decision
            .explanations
            .into_iter()
            .map(|e| ExplanationOut {
                feature: e.feature,
                value: e.value,
            })
            .collect(),
        trace_id: Uuid::new_v4().to_string(),
    }
}

async fn score_invoice(
    State(state): State<ApiState>,
    Extension(claims): Extension<Claims>,
    Json(invoice): Json<InvoiceIn>,
) -> AppResult<Json<ScoreInvoiceResponse>> {
    validation::validate_schema(&invoice)?;

    let outcome = state
        .orchestrator
        .score_invoice(&claims.tenant_id, invoice)
        .await
        .map_err(AppError::Store)?;

    Ok(Json(decision_to_response(outcome.decision)))
}

async fn get_decision(
    State(state): State<ApiState>,
    Extension(claims): Extension<Claims>,
    Path(invoice_id): Path<String>,
) -> AppResult<Json<ScoreInvoiceResponse>> {
    let decision = state
        .orchestrator
        .store
        .load_latest_decision(&claims.tenant_id, &invoice_id)
        .await
        .map_err(AppError::Store)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(decision_to_response(decision)))
}

async fn dispose_case(
    State(state): State<ApiState>,
    Extension(claims): Extension<Claims>,
    Path(invoice_id): Path<String>,
    Json(body): Json<DispositionRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let case = state
        .orchestrator
        .store
        .find_open_case(&claims.tenant_id, &invoice_id)
        .await
        .map_err(AppError::Store)?
        .ok_or(AppError::NotFound)?;

    let disposition = Disposition {
        user: body.user,
        timestamp: chrono::Utc::now(),
        label: body.label,
        notes: body.notes,
    };

    state
        .orchestrator
        .store
        .dispose_case(&claims.tenant_id, &case.case_id, &disposition)
        .await
        .map_err(AppError::Store)?;

    state
        .orchestrator
        .store
        .append_audit(&crate::domain::AuditEntry {
            tenant_id: claims.tenant_id.clone(),
            actor: disposition.user.clone(),
            action: "disposition".to_string(),
            entity: "case".to_string(),
            entity_id: case.case_id.clone(),
            payload: serde_json::to_string(&disposition).unwrap_or_default(),
            created_at: disposition.timestamp,
        })
        .await
        .map_err(AppError::Store)?;

    Ok(Json(json!({ "status": "closed", "case_id": case.case_id })))
}
