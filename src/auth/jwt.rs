//! JWT Handler
//! Mission: validate Bearer tokens issued by an external identity provider
//! (spec.md §6). This service never mints tokens.

use crate::auth::models::Claims;
use anyhow::{Context, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::debug;

pub struct JwtHandler {
    secret: String,
    audience: Option<String>,
    issuer: Option<String>,
}

impl JwtHandler {
    pub fn new(secret: String, audience: Option<String>, issuer: Option<String>) -> Self {
        Self {
            secret,
            audience,
            issuer,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }

        let decoded = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)
            .context("invalid or expired token")?;

        debug!(tenant_id = %decoded.claims.tenant_id, "validated bearer token");
        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(tenant_id: &str, secret: &str) -> String {
        let claims = Claims {
            tenant_id: tenant_id.to_string(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn validates_well_formed_token() {
        let handler = JwtHandler::new("s3cr3t".into(), None, None);
        let token = token_for("tenant-a", "s3cr3t");
        let claims = handler.validate_token(&token).unwrap();
        assert_eq!(claims.tenant_id, "tenant-a");
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let handler = JwtHandler::new("s3cr3t".into(), None, None);
        let token = token_for("tenant-a", "other-secret");
        assert!(handler.validate_token(&token).is_err());
    }

    #[test]
    fn rejects_audience_mismatch() {
        let claims = Claims {
            tenant_id: "tenant-a".into(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"s3cr3t")).unwrap();
        let handler = JwtHandler::new("s3cr3t".into(), Some("sieve-api".into()), None);
        assert!(handler.validate_token(&token).is_err());
    }
}
