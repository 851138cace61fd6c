//! Invoice Anomaly Sieve — process entrypoint.
//! Mission: wire config, store, thresholds, scorer, and auth into one axum
//! server (spec.md §6, §9).

use std::sync::Arc;

use axum::http::Method;
use rusqlite::Connection;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use invoice_anomaly_sieve::api::{self, ApiState};
use invoice_anomaly_sieve::auth::{auth_middleware, AuthState, JwtHandler};
use invoice_anomaly_sieve::config::{Config, ThresholdStore, Thresholds};
use invoice_anomaly_sieve::duplicate_scorer;
use invoice_anomaly_sieve::middleware::request_logging_simple;
use invoice_anomaly_sieve::orchestrator::Orchestrator;
use invoice_anomaly_sieve::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let store = Store::open(&config.database_path)?;

    let threshold_conn = Connection::open(&config.database_path)?;
    let thresholds = Arc::new(ThresholdStore::new(
        Arc::new(parking_lot::Mutex::new(threshold_conn)),
        Thresholds {
            t_hold: config.default_t_hold,
            t_review: config.default_t_review,
        },
    ));

    let scorer: Arc<dyn duplicate_scorer::DuplicateScorer> =
        Arc::from(duplicate_scorer::load_scorer(config.model_artifact_path.as_deref()));

    let jwt_handler = Arc::new(JwtHandler::new(
        config.jwt_secret.clone(),
        config.jwt_audience.clone(),
        config.jwt_issuer.clone(),
    ));
    let auth_state = AuthState {
        jwt_handler,
        dev_auth_bypass: config.dev_auth_bypass,
    };

    let orchestrator = Arc::new(Orchestrator {
        store,
        thresholds,
        scorer,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(Any);

    let scoring_routes = api::router(ApiState { orchestrator })
        .layer(axum::middleware::from_fn_with_state(auth_state, auth_middleware));

    let app = api::health_router()
        .merge(scoring_routes)
        .layer(axum::middleware::from_fn(request_logging_simple))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = std::env::var("SIEVE_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "invoice anomaly sieve listening");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
