/// Password Hashing and Verification
///
/// Hashing is a pluggable capability behind `PasswordHasher`; bcrypt is
/// the implementation wired in by default.

use bcrypt::{hash, verify};

use crate::error::AppError;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AppError>;

    /// `Ok(false)` on mismatch; `Err` only when `hash` is unusable
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError>;

    /// A well-formed hash of a random secret, verified in place of a real
    /// one when the email is unknown
    fn dummy_hash(&self) -> &str;
}

pub struct BcryptHasher {
    cost: u32,
    dummy_hash: String,
}

impl BcryptHasher {
    /// # Errors
    /// Returns error if `cost` is outside bcrypt's accepted range
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let secret = crate::auth::generate_refresh_token();
        let dummy_hash = hash(secret, cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(Self { cost, dummy_hash })
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AppError> {
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }

    fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}
