//! Shared domain types for the scoring core.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DecisionLabel {
    Pass,
    Review,
    Hold,
}

impl DecisionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionLabel::Hold => "HOLD",
            DecisionLabel::Review => "REVIEW",
            DecisionLabel::Pass => "PASS",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "HOLD" => Some(DecisionLabel::Hold),
            "REVIEW" => Some(DecisionLabel::Review),
            "PASS" => Some(DecisionLabel::Pass),
            _ => None,
        }
    }

    /// `HOLD > REVIEW > PASS`, per spec.md §4.7/§4.8.
    pub fn strictest(self, other: DecisionLabel) -> DecisionLabel {
        self.max(other)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemIn {
    pub desc: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sku: Option<String>,
    pub gl_code: Option<String>,
    pub cost_center: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceIn {
    pub invoice_id: String,
    pub vendor_id: String,
    pub vendor_name: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub currency: String,
    pub total: Decimal,
    pub tax_total: Option<Decimal>,
    pub po_number: Option<String>,
    pub remit_account: Option<String>,
    pub remit_name: Option<String>,
    pub pdf_hash: Option<String>,
    pub terms: Option<String>,
    pub line_items: Vec<LineItemIn>,
}

#[derive(Debug, Clone)]
pub struct InvoiceRow {
    pub tenant_id: String,
    pub invoice_id: String,
    pub vendor_id: String,
    pub vendor_name: String,
    pub invoice_number_raw: String,
    pub invoice_number_norm: String,
    pub invoice_date: NaiveDate,
    pub currency: String,
    pub total: Decimal,
    pub tax_total: Option<Decimal>,
    pub po_number: Option<String>,
    pub remit_account_hash: Option<String>,
    pub remit_account_masked: Option<String>,
    pub remit_name: Option<String>,
    pub pdf_hash: Option<String>,
    pub terms: Option<String>,
    pub payload_hash: String,
    pub payload_json: String,
    pub normalizer_version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LineRow {
    pub tenant_id: String,
    pub invoice_id: String,
    pub line_no: i64,
    pub description: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sku: Option<String>,
    pub gl_code: Option<String>,
    pub cost_center: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemitSighting {
    pub tenant_id: String,
    pub vendor_id: String,
    pub remit_account_hash: String,
    pub remit_name: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VendorBaseline {
    pub tenant_id: String,
    pub vendor_id: String,
    pub median: Decimal,
    pub mad_like: Decimal,
    pub sample_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopMatch {
    pub invoice_id: String,
    pub similarity: f64,
    pub feature_digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub feature: String,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub tenant_id: String,
    pub decision_id: String,
    pub invoice_id: String,
    pub model_id: String,
    pub model_version: String,
    pub ruleset_version: String,
    pub risk_score: Decimal,
    pub decision: DecisionLabel,
    pub reason_codes: Vec<String>,
    pub top_matches: Vec<TopMatch>,
    pub explanations: Vec<Explanation>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Open,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "OPEN",
            CaseStatus::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disposition {
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub tenant_id: String,
    pub case_id: String,
    pub invoice_id: String,
    pub status: CaseStatus,
    pub sla_due: DateTime<Utc>,
    pub disposition: Option<Disposition>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub tenant_id: String,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}
