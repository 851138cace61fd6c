//! Snapshot Store
//! Mission: persist immutable invoice snapshots, lines, remit sightings,
//! decisions, cases, and audit entries (spec.md §4.2), one `Store` handle
//! wrapping a single SQLite connection behind a mutex, in the teacher's
//! `VaultDb` style.

pub mod audit;
pub mod baselines;
pub mod cases;
pub mod decisions;
pub mod invoices;
pub mod remit;
pub mod schema;
pub mod text_index;
pub mod transactions;

use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).with_context(|| format!("open store db {db_path}"))?;
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        schema::init(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}
