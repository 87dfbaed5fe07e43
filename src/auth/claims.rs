/// JWT Claims structure
///
/// Payload of an access token: identity, roles and the standard
/// registered claims (RFC 7519).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::identity::{Identity, Role};

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity ID as UUID string)
    pub sub: String,
    pub email: String,
    pub roles: Vec<Role>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique token id; keeps two tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Claims for `identity`, valid from `issued_at` for `expiry_seconds`
    pub fn new(
        identity: &Identity,
        issued_at: DateTime<Utc>,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            roles: identity.roles.clone(),
            exp: iat + expiry_seconds,
            iat,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract identity ID from claims
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid)
    }
}
