/// Credential Verifier
///
/// Checks an email/password pair against the stored hash. Read-only.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::password::PasswordHasher;
use crate::error::{AppError, AuthError};
use crate::identity::Identity;
use crate::store::{with_timeout, IdentityRepository};

pub struct CredentialVerifier {
    identities: Arc<dyn IdentityRepository>,
    hasher: Arc<dyn PasswordHasher>,
    lookup_timeout: Duration,
}

impl CredentialVerifier {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        hasher: Arc<dyn PasswordHasher>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            identities,
            hasher,
            lookup_timeout,
        }
    }

    /// # Errors
    /// `AuthError::InvalidCredentials` for an unknown email and for a wrong
    /// password alike. An unknown email still pays for one hash
    /// verification against the dummy hash, so the two cases take the same
    /// time.
    pub async fn verify(&self, email: &str, password: &str) -> Result<Identity, AppError> {
        let identity = with_timeout(self.lookup_timeout, self.identities.find_by_email(email)).await?;

        let stored_hash = match &identity {
            Some(identity) => identity.password_hash.clone(),
            None => self.hasher.dummy_hash().to_string(),
        };

        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?;

        let password_valid = match verified {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash is unusable");
                false
            }
        };

        match identity {
            Some(identity) if password_valid => Ok(identity),
            _ => Err(AuthError::InvalidCredentials.into()),
        }
    }
}
