/// JWT Token Generation and Validation
///
/// Access tokens are HS256 JWTs signed with the process-wide secret.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Sign `claims` into an access token
///
/// # Errors
/// Returns error if token encoding fails
pub fn generate_access_token(claims: &Claims, config: &JwtSettings) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate and extract claims from an access token
///
/// # Errors
/// - `AuthError::TokenExpired` once `exp` has passed
/// - `AuthError::TokenInvalid` if the token is malformed, tampered with or
///   from another issuer
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => {
            tracing::warn!("JWT validation error: {}", e);
            AuthError::TokenInvalid
        }
    })
}
