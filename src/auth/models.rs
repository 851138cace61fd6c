//! Authentication Models
//! Mission: the JWT claims this service ever decodes. Token issuance is out
//! of scope (spec.md Non-goals) — tokens are minted by an external identity
//! provider and this service only verifies them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub tenant_id: String,
    pub exp: usize,
}
