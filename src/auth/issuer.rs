/// Token Issuer
///
/// Mints an access/refresh token pair for an authenticated identity. Pure
/// computation; persisting the refresh token is the caller's job.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::auth::claims::Claims;
use crate::auth::jwt::{generate_access_token, validate_access_token};
use crate::auth::refresh_token::generate_refresh_token;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub email: String,
    pub authenticated: bool,
    pub creation: DateTime<Utc>,
    /// When the access token stops being accepted
    pub expiration: DateTime<Utc>,
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expiration: DateTime<Utc>,
}

pub struct TokenIssuer {
    config: JwtSettings,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(config: JwtSettings, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &JwtSettings {
        &self.config
    }

    /// # Errors
    /// Returns error if the access token cannot be signed
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        let creation = self.clock.now();
        let claims = Claims::new(
            identity,
            creation,
            self.config.access_token_expiry,
            self.config.issuer.clone(),
        );
        let access_token = generate_access_token(&claims, &self.config)?;

        Ok(TokenPair {
            email: identity.email.clone(),
            authenticated: true,
            creation,
            expiration: creation + Duration::seconds(self.config.access_token_expiry),
            access_token,
            refresh_token: generate_refresh_token(),
            refresh_expiration: creation + Duration::seconds(self.config.refresh_token_expiry),
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        validate_access_token(token, &self.config)
    }
}
