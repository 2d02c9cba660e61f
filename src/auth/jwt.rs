//! Client-side JWT inspection.
//!
//! The client never holds the signing key, so tokens are decoded without
//! signature verification and only the embedded claims are read. The backend
//! remains the authority on whether a token is accepted.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::api::models::{RecordId, Role};
use crate::error::AuthError;

/// Claims carried by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Expiration time (seconds since the epoch).
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_id: Option<RecordId>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub email: Option<String>,
    /// `access` or `refresh`.
    #[serde(default)]
    pub token_type: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Decode a token's claims without verifying its signature.
pub fn decode_claims(token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Claims of a token that is decodable and unexpired at `now`.
pub fn valid_claims_at(token: &str, now: DateTime<Utc>) -> Option<Claims> {
    decode_claims(token)
        .ok()
        .filter(|claims| !claims.is_expired_at(now))
}
