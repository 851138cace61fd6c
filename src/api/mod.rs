//! API
//! Mission: HTTP surface for the scoring service (spec.md §6).

pub mod models;
pub mod routes;

pub use routes::{health_router, router, ApiState};
