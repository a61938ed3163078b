use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_core::UserId;

use crate::{Principal, Role};

/// JWT claims model.
///
/// The minimal set of claims Stockbook expects once a token has been decoded
/// and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// The single role held by the user.
    pub role: Role,

    /// Absent means active. Issuers set it to `false` for deactivated accounts.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl JwtClaims {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.sub,
            role: self.role,
            active: self.active,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("malformed or unsigned token: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims against `now`.
///
/// Validates the time window only. Signature checks belong to the [`JwtValidator`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Decodes and verifies a bearer token into claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 validator over a shared secret.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry lives in `expires_at`, not the registered `exp` claim.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
