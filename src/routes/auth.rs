/// Authentication Routes
///
/// Login, refresh-token rotation, registration, logout and the current
/// identity.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthService, Claims, TokenPair};
use crate::error::{ContextualError, ErrorContext};
use crate::identity::IdentityResponse;

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub email: String,
    pub refresh_token: String,
}

/// User registration request. Roles are never taken from the client.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Token pair returned by login and refresh
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub email: String,
    pub authenticated: bool,
    pub creation: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            email: pair.email,
            authenticated: pair.authenticated,
            creation: pair.creation,
            expiration: pair.expiration,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

/// POST /auth/login
///
/// # Errors
/// - 400: Malformed email or empty password
/// - 401: Invalid credentials (same response for unknown email and wrong password)
pub async fn login(
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ContextualError> {
    let context = ErrorContext::new("login");

    let pair = service
        .login(&form.email, &form.password)
        .await
        .map_err(|e| context.wrap(e))?;

    tracing::info!(request_id = %context.request_id, "Token pair issued");
    Ok(HttpResponse::Ok().json(TokenResponse::from(pair)))
}

/// PUT /auth/refresh
///
/// Exchanges a refresh token for a new pair. The presented token is
/// invalidated, so a stolen token stops working after the legitimate client
/// refreshes.
///
/// # Errors
/// - 400: Missing email or token
/// - 401: Unknown, mismatched, already-rotated or expired token
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ContextualError> {
    let context = ErrorContext::new("token_refresh");

    let pair = service
        .refresh_session(&form.email, &form.refresh_token)
        .await
        .map_err(|e| context.wrap(e))?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");
    Ok(HttpResponse::Ok().json(TokenResponse::from(pair)))
}

/// POST /auth/register
///
/// # Errors
/// - 400: Validation errors, reported per field
/// - 409: Email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ContextualError> {
    let context = ErrorContext::new("registration");

    let identity = service
        .register(&form.email, &form.password)
        .await
        .map_err(|e| context.wrap(e))?;

    Ok(HttpResponse::Created().json(IdentityResponse::from(&identity)))
}

/// POST /auth/logout
///
/// **Requires a valid access token.** Revokes the caller's refresh token.
pub async fn logout(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ContextualError> {
    let context = ErrorContext::new("logout").with_user_id(claims.sub.clone());

    service
        .logout(&claims)
        .await
        .map_err(|e| context.wrap(e))?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /auth/me
///
/// **Requires a valid access token.**
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ContextualError> {
    let context = ErrorContext::new("current_identity").with_user_id(claims.sub.clone());

    let identity = service
        .current_identity(&claims)
        .await
        .map_err(|e| context.wrap(e))?;

    Ok(HttpResponse::Ok().json(IdentityResponse::from(&identity)))
}
