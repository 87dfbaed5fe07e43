/// Auth Service
///
/// Entry point for every authentication use case. Handlers pass the caller's
/// identity in explicitly (as validated `Claims`); nothing here reads
/// ambient request state.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::claims::Claims;
use crate::auth::coordinator::RefreshCoordinator;
use crate::auth::credentials::CredentialVerifier;
use crate::auth::issuer::{TokenIssuer, TokenPair};
use crate::auth::password::PasswordHasher;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::identity::{Identity, NewIdentity, Role};
use crate::store::{with_timeout, IdentityRepository, TokenStore};
use crate::validators::{validate_login, validate_refresh, validate_registration};

pub struct AuthService {
    identities: Arc<dyn IdentityRepository>,
    store: Arc<dyn TokenStore>,
    hasher: Arc<dyn PasswordHasher>,
    verifier: CredentialVerifier,
    issuer: Arc<TokenIssuer>,
    coordinator: RefreshCoordinator,
    clock: Arc<dyn Clock>,
    lookup_timeout: Duration,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        store: Arc<dyn TokenStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        jwt: JwtSettings,
        lookup_timeout: Duration,
    ) -> Self {
        let issuer = Arc::new(TokenIssuer::new(jwt, Arc::clone(&clock)));
        let verifier = CredentialVerifier::new(
            Arc::clone(&identities),
            Arc::clone(&hasher),
            lookup_timeout,
        );
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&identities),
            Arc::clone(&store),
            Arc::clone(&issuer),
            Arc::clone(&clock),
            lookup_timeout,
        );

        Self {
            identities,
            store,
            hasher,
            verifier,
            issuer,
            coordinator,
            clock,
            lookup_timeout,
        }
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        self.issuer.config()
    }

    /// Create an identity holding only `Role::Common`. The email must not be
    /// registered yet.
    ///
    /// # Errors
    /// - Validation errors for a malformed email or weak password
    /// - `StoreError::Conflict` when the email is taken
    pub async fn register(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let input = validate_registration(email, password)?;

        let hasher = Arc::clone(&self.hasher);
        let password = input.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

        let identity = with_timeout(
            self.lookup_timeout,
            self.identities.create(NewIdentity {
                email: input.email,
                password_hash,
                roles: vec![Role::Common],
            }),
        )
        .await?;

        tracing::info!(user_id = %identity.id, "Identity registered");
        Ok(identity)
    }

    /// Verify credentials, issue a pair and persist its refresh token.
    ///
    /// Nothing is persisted unless every step before the save succeeded.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let input = validate_login(email, password)?;

        let identity = self.verifier.verify(&input.email, &input.password).await?;
        let pair = self.issuer.issue(&identity)?;

        with_timeout(
            self.lookup_timeout,
            self.store.save(
                &identity.email,
                &pair.refresh_token,
                pair.creation,
                pair.refresh_expiration,
            ),
        )
        .await?;

        tracing::info!(user_id = %identity.id, "Identity logged in");
        Ok(pair)
    }

    pub async fn refresh_session(
        &self,
        email: &str,
        refresh_token: &str,
    ) -> Result<TokenPair, AppError> {
        let input = validate_refresh(email, refresh_token)?;
        self.coordinator
            .refresh(&input.email, &input.refresh_token)
            .await
    }

    /// Revoke the caller's refresh token. Outstanding access tokens stay
    /// valid until they expire.
    pub async fn logout(&self, claims: &Claims) -> Result<(), AppError> {
        with_timeout(self.lookup_timeout, self.store.invalidate(&claims.email)).await?;

        tracing::info!(user_id = %claims.sub, "Session revoked");
        Ok(())
    }

    pub async fn current_identity(&self, claims: &Claims) -> Result<Identity, AppError> {
        with_timeout(self.lookup_timeout, self.identities.find_by_email(&claims.email))
            .await?
            .ok_or_else(|| AuthError::Unauthorized.into())
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.issuer.validate_access_token(token)
    }

    /// Remove refresh records that have already expired
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let purged = with_timeout(self.lookup_timeout, self.store.purge_expired(self.clock.now()))
            .await?;
        Ok(purged)
    }
}
