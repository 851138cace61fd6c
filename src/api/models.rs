//! API Wire Models
//! Mission: the JSON shapes for `/scoreInvoice` and `/invoice/{id}/decision`
//! (spec.md §6). Deliberately thin — the orchestrator works in domain types,
//! these exist only to (de)serialize at the HTTP boundary.

use serde::{Deserialize, Serialize};

pub use crate::domain::InvoiceIn;

#[derive(Debug, Serialize)]
pub struct TopMatchOut {
    pub invoice_id: String,
    pub similarity: f64,
    pub features: String,
}

#[derive(Debug, Serialize)]
pub struct ExplanationOut {
    pub feature: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct ScoreInvoiceResponse {
    pub risk_score: f64,
    pub decision: String,
    pub reason_codes: Vec<String>,
    pub top_matches: Vec<TopMatchOut>,
    pub explanations: Vec<ExplanationOut>,
    pub trace_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DispositionRequest {
    pub user: String,
    pub label: String,
    pub notes: Option<String>,
}
