//! Authentication
//! Mission: Bearer JWT validation for every scoring endpoint, with an
//! optional development bypass (spec.md §6).

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtHandler;
pub use middleware::{auth_middleware, extract_claims, AuthState};
pub use models::Claims;
