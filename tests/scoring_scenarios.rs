//! End-to-end scoring scenarios (spec.md §8 "Testable properties"), driven
//! directly against an `Orchestrator` over a temp-file SQLite store rather
//! than a running HTTP server.

use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::NamedTempFile;

use invoice_anomaly_sieve::config::{Config, ThresholdStore, Thresholds};
use invoice_anomaly_sieve::domain::{DecisionLabel, InvoiceIn, LineItemIn};
use invoice_anomaly_sieve::duplicate_scorer;
use invoice_anomaly_sieve::orchestrator::Orchestrator;
use invoice_anomaly_sieve::store::Store;

fn test_config() -> Config {
    Config {
        database_path: String::new(),
        model_artifact_path: None,
        jwt_secret: "test-secret".into(),
        jwt_audience: None,
        jwt_issuer: None,
        dev_auth_bypass: true,
        candidate_cap: 200,
        cold_start_invoices: 50,
        same_po_total_tol: 0.005,
        same_po_window_days: 30,
        bank_change_lookback_months: 12,
        line_cost_alpha: 0.7,
        line_cost_beta: 0.2,
        line_cost_gamma: 0.1,
        request_timeout_ms: 5_000,
        default_t_hold: 80.0,
        default_t_review: 50.0,
        ruleset_version: "r1".into(),
    }
}

fn orchestrator_over(db_path: &str) -> Orchestrator {
    let store = Store::open(db_path).unwrap();
    let threshold_conn = rusqlite::Connection::open(db_path).unwrap();
    let thresholds = Arc::new(ThresholdStore::new(
        Arc::new(parking_lot::Mutex::new(threshold_conn)),
        Thresholds {
            t_hold: 80.0,
            t_review: 50.0,
        },
    ));
    let scorer: Arc<dyn duplicate_scorer::DuplicateScorer> = Arc::from(duplicate_scorer::load_scorer(None));
    Orchestrator {
        store,
        thresholds,
        scorer,
        config: test_config(),
    }
}

fn line(desc: &str, qty: i64, price: i64, amount: i64) -> LineItemIn {
    LineItemIn {
        desc: desc.to_string(),
        qty: rust_decimal::Decimal::from(qty),
        unit_price: rust_decimal::Decimal::from(price),
        amount: rust_decimal::Decimal::from(amount),
        sku: None,
        gl_code: None,
        cost_center: None,
    }
}

fn invoice(id: &str, po: Option<&str>, total: i64, date: (i32, u32, u32), lines: Vec<LineItemIn>) -> InvoiceIn {
    InvoiceIn {
        invoice_id: id.to_string(),
        vendor_id: "vendor-1".to_string(),
        vendor_name: "Acme Supplies".to_string(),
        invoice_number: format!("INV-{id}"),
        invoice_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        currency: "USD".to_string(),
        total: rust_decimal::Decimal::from(total),
        tax_total: None,
        po_number: po.map(|s| s.to_string()),
        remit_account: None,
        remit_name: None,
        pdf_hash: None,
        terms: None,
        line_items: lines,
    }
}

#[tokio::test]
async fn same_po_near_total_forces_hold() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap();
    let orch = orchestrator_over(db_path);

    let first = invoice(
        "inv-1",
        Some("PO1"),
        10000,
        (2026, 1, 1),
        vec![line("widget", 1, 10000, 10000)],
    );
    orch.score_invoice("tenant-a", first).await.unwrap();

    let second = invoice(
        "inv-2",
        Some("PO1"),
        10005,
        (2026, 1, 10),
        vec![line("widget", 1, 10005, 10005)],
    );
    let outcome = orch.score_invoice("tenant-a", second).await.unwrap();

    assert_eq!(outcome.decision.decision, DecisionLabel::Hold);
    assert!(outcome.decision.reason_codes.contains(&"SAME_PO_NEAR_TOTAL".to_string()));
}

#[tokio::test]
async fn same_po_out_of_tolerance_does_not_force_hold() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap();
    let orch = orchestrator_over(db_path);

    let first = invoice(
        "inv-1",
        Some("PO1"),
        10000,
        (2026, 1, 1),
        vec![line("widget", 1, 10000, 10000)],
    );
    orch.score_invoice("tenant-a", first).await.unwrap();

    let second = invoice(
        "inv-2",
        Some("PO1"),
        10600,
        (2026, 1, 5),
        vec![line("widget", 1, 10600, 10600)],
    );
    let outcome = orch.score_invoice("tenant-a", second).await.unwrap();

    assert!(!outcome
        .decision
        .reason_codes
        .contains(&"SAME_PO_NEAR_TOTAL".to_string()));
}

#[tokio::test]
async fn identical_line_lists_reach_perfect_coverage() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap();
    let orch = orchestrator_over(db_path);

    let first = invoice(
        "inv-1",
        None,
        100,
        (2026, 1, 1),
        vec![line("paper a4", 10, 10, 100)],
    );
    orch.score_invoice("tenant-a", first).await.unwrap();

    let second = invoice(
        "inv-2",
        None,
        100,
        (2026, 1, 2),
        vec![line("paper a4", 10, 10, 100)],
    );
    let outcome = orch.score_invoice("tenant-a", second).await.unwrap();

    let top = outcome.decision.top_matches.first().expect("one candidate expected");
    assert_eq!(top.invoice_id, "inv-1");
}

#[tokio::test]
async fn new_remit_account_triggers_bank_change_and_review() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap();
    let orch = orchestrator_over(db_path);

    let mut first = invoice(
        "inv-1",
        None,
        500,
        (2026, 1, 1),
        vec![line("consulting", 1, 500, 500)],
    );
    first.remit_account = Some("GB00-1111-2222".to_string());
    let outcome = orch.score_invoice("tenant-a", first).await.unwrap();

    assert!(outcome.decision.reason_codes.contains(&"BANK_CHANGE".to_string()));
    assert!(outcome.decision.decision >= DecisionLabel::Review);
    assert!(outcome.case_id.is_some());

    let sighting = orch
        .store
        .find_remit_sighting("tenant-a", "vendor-1", &invoice_anomaly_sieve::normalizer::hash_account(Some("GB00-1111-2222")).unwrap())
        .await
        .unwrap();
    assert!(sighting.is_some());
}

#[tokio::test]
async fn idempotent_resubmission_reuses_the_decision() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap();
    let orch = orchestrator_over(db_path);

    let payload = invoice(
        "inv-1",
        None,
        250,
        (2026, 1, 1),
        vec![line("widget", 1, 250, 250)],
    );

    let first = orch.score_invoice("tenant-a", payload.clone()).await.unwrap();
    assert!(!first.is_resubmission);

    let second = orch.score_invoice("tenant-a", payload).await.unwrap();
    assert!(second.is_resubmission);
    assert_eq!(first.decision.risk_score, second.decision.risk_score);
    assert_eq!(first.decision.decision, second.decision.decision);

    let row_count: i64 = {
        let conn = rusqlite::Connection::open(db_path).unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM invoices WHERE tenant_id = 'tenant-a' AND invoice_id = 'inv-1'",
            [],
            |r| r.get(0),
        )
        .unwrap()
    };
    assert_eq!(row_count, 1);
}

#[tokio::test]
async fn tenants_do_not_see_each_others_candidates() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap();
    let orch = orchestrator_over(db_path);

    let a_invoice = invoice(
        "inv-1",
        None,
        100,
        (2026, 1, 1),
        vec![line("paper a4", 10, 10, 100)],
    );
    orch.score_invoice("tenant-a", a_invoice).await.unwrap();

    let b_invoice = invoice(
        "inv-2",
        None,
        100,
        (2026, 1, 1),
        vec![line("paper a4", 10, 10, 100)],
    );
    let outcome = orch.score_invoice("tenant-b", b_invoice).await.unwrap();

    assert!(outcome.decision.top_matches.is_empty());
}

#[tokio::test]
async fn candidate_count_never_exceeds_the_configured_cap() {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap();
    let orch = orchestrator_over(db_path);

    for i in 0..6 {
        let inv = invoice(
            &format!("inv-seed-{i}"),
            Some("PO-SHARED"),
            100 + i,
            (2026, 1, 1),
            vec![line("widget", 1, 100 + i, 100 + i)],
        );
        orch.score_invoice("tenant-a", inv).await.unwrap();
    }

    let query_payload = invoice(
        "inv-query",
        Some("PO-SHARED"),
        100,
        (2026, 1, 1),
        vec![line("widget", 1, 100, 100)],
    );
    let query_norm = invoice_anomaly_sieve::normalizer::invoice_number_norm(&query_payload.invoice_number);
    let query_row = invoice_anomaly_sieve::store::invoices::build_invoice_row(
        "tenant-a",
        &query_payload,
        query_norm,
        None,
        None,
        "hash".to_string(),
        "{}".to_string(),
    );

    let candidates = invoice_anomaly_sieve::retriever::retrieve_candidates(&orch.store, &query_row, 3)
        .await
        .unwrap();
    assert!(candidates.len() <= 3);
}
