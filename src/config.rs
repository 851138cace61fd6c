//! Process configuration
//! Mission: load every tunable the scoring core needs from the environment
//! once at startup, the way the teacher crate boots its `Config`, and expose
//! the one value that genuinely needs runtime, per-tenant/per-vendor
//! overrides (the HOLD/REVIEW thresholds) through a small cached store
//! instead of a process restart.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use anyhow::Result;

/// Process-wide, read-only after startup. Reload procedure: restart the
/// process (per spec.md §9, "Process-wide state").
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub model_artifact_path: Option<String>,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub jwt_issuer: Option<String>,
    pub dev_auth_bypass: bool,
    pub candidate_cap: usize,
    pub cold_start_invoices: usize,
    pub same_po_total_tol: f64,
    pub same_po_window_days: i64,
    pub bank_change_lookback_months: i64,
    pub line_cost_alpha: f64,
    pub line_cost_beta: f64,
    pub line_cost_gamma: f64,
    pub request_timeout_ms: u64,
    pub default_t_hold: f64,
    pub default_t_review: f64,
    pub ruleset_version: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_path: env::var("SIEVE_DATABASE_PATH")
                .unwrap_or_else(|_| "invoice_sieve.db".to_string()),
            model_artifact_path: env::var("SIEVE_MODEL_ARTIFACT_PATH").ok(),
            jwt_secret: env::var("SIEVE_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            jwt_audience: env::var("SIEVE_JWT_AUDIENCE").ok(),
            jwt_issuer: env::var("SIEVE_JWT_ISSUER").ok(),
            dev_auth_bypass: env::var("SIEVE_DEV_AUTH_BYPASS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on"))
                .unwrap_or(false),
            candidate_cap: env_or("SIEVE_CANDIDATE_CAP", 200),
            cold_start_invoices: env_or("SIEVE_COLD_START_INVOICES", 50),
            same_po_total_tol: env_or("SIEVE_SAME_PO_TOTAL_TOL", 0.005),
            same_po_window_days: env_or("SIEVE_SAME_PO_WINDOW_DAYS", 30),
            bank_change_lookback_months: env_or("SIEVE_BANK_CHANGE_LOOKBACK_MONTHS", 12),
            line_cost_alpha: env_or("SIEVE_LINE_COST_ALPHA", 0.7),
            line_cost_beta: env_or("SIEVE_LINE_COST_BETA", 0.2),
            line_cost_gamma: env_or("SIEVE_LINE_COST_GAMMA", 0.1),
            request_timeout_ms: env_or("SIEVE_REQUEST_TIMEOUT_MS", 5_000),
            default_t_hold: env_or("SIEVE_T_HOLD", 80.0),
            default_t_review: env_or("SIEVE_T_REVIEW", 50.0),
            ruleset_version: env::var("SIEVE_RULESET_VERSION").unwrap_or_else(|_| "r1".to_string()),
        }
    }
}

/// Resolved decision thresholds for one vendor.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub t_hold: f64,
    pub t_review: f64,
}

const CACHE_TTL: Duration = Duration::from_secs(30);

/// Keyed config store with vendor-then-global scope fallback (spec.md §9).
/// Backed by SQLite so an operator can override thresholds without a
/// restart; the in-process cache is a short-TTL convenience, never the
/// source of truth.
pub struct ThresholdStore {
    conn: Arc<Mutex<Connection>>,
    defaults: Thresholds,
    cache: Mutex<HashMap<(String, String, String), (f64, Instant)>>,
}

impl ThresholdStore {
    pub fn new(conn: Arc<Mutex<Connection>>, defaults: Thresholds) -> Self {
        Self {
            conn,
            defaults,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, tenant_id: &str, scope: &str, key: &str) -> Result<Option<f64>> {
        let cache_key = (tenant_id.to_string(), scope.to_string(), key.to_string());
        if let Some((value, at)) = self.cache.lock().get(&cache_key) {
            if at.elapsed() < CACHE_TTL {
                return Ok(Some(*value));
            }
        }

        let conn = self.conn.lock();
        let value: Option<f64> = conn
            .query_row(
                "SELECT value FROM config_overrides WHERE tenant_id = ?1 AND scope = ?2 AND key = ?3",
                params![tenant_id, scope, key],
                |row| row.get(0),
            )
            .ok();
        drop(conn);

        if let Some(v) = value {
            self.cache.lock().insert(cache_key, (v, Instant::now()));
        }
        Ok(value)
    }

    fn resolve(&self, tenant_id: &str, vendor_id: &str, key: &str, default: f64) -> f64 {
        let vendor_scope = format!("vendor:{vendor_id}");
        if let Ok(Some(v)) = self.lookup(tenant_id, &vendor_scope, key) {
            return v;
        }
        if let Ok(Some(v)) = self.lookup(tenant_id, "global", key) {
            return v;
        }
        default
    }

    pub fn thresholds_for(&self, tenant_id: &str, vendor_id: &str) -> Thresholds {
        Thresholds {
            t_hold: self.resolve(tenant_id, vendor_id, "T_hold", self.defaults.t_hold),
            t_review: self.resolve(tenant_id, vendor_id, "T_review", self.defaults.t_review),
        }
    }

    pub fn set_override(&self, tenant_id: &str, scope: &str, key: &str, value: f64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO config_overrides (tenant_id, scope, key, value) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(tenant_id, scope, key) DO UPDATE SET value = excluded.value",
            params![tenant_id, scope, key, value],
        )?;
        drop(conn);
        self.cache
            .lock()
            .remove(&(tenant_id.to_string(), scope.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ThresholdStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE config_overrides (
                tenant_id TEXT NOT NULL,
                scope TEXT NOT NULL,
                key TEXT NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (tenant_id, scope, key)
            )",
            [],
        )
        .unwrap();
        ThresholdStore::new(
            Arc::new(Mutex::new(conn)),
            Thresholds {
                t_hold: 80.0,
                t_review: 50.0,
            },
        )
    }

    #[test]
    fn falls_back_to_global_then_default() {
        let store = store();
        let t = store.thresholds_for("tenant-a", "vendor-1");
        assert_eq!(t.t_hold, 80.0);

        store.set_override("tenant-a", "global", "T_hold", 70.0).unwrap();
        let t = store.thresholds_for("tenant-a", "vendor-1");
        assert_eq!(t.t_hold, 70.0);

        store
            .set_override("tenant-a", "vendor:vendor-1", "T_hold", 60.0)
            .unwrap();
        let t = store.thresholds_for("tenant-a", "vendor-1");
        assert_eq!(t.t_hold, 60.0);

        let other = store.thresholds_for("tenant-a", "vendor-2");
        assert_eq!(other.t_hold, 70.0);
    }

    #[test]
    fn cached_override_does_not_leak_across_tenants() {
        let store = store();
        store.set_override("tenant-a", "global", "T_hold", 70.0).unwrap();
        // Warm the cache under tenant-a's key.
        let t_a = store.thresholds_for("tenant-a", "vendor-1");
        assert_eq!(t_a.t_hold, 70.0);

        let t_b = store.thresholds_for("tenant-b", "vendor-1");
        assert_eq!(t_b.t_hold, 80.0);
    }
}
