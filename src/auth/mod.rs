/// Authentication module
///
/// Credential verification, token issuance, refresh-token rotation and the
/// `AuthService` that ties them together.

mod claims;
mod coordinator;
mod credentials;
mod issuer;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::Claims;
pub use coordinator::RefreshCoordinator;
pub use credentials::CredentialVerifier;
pub use issuer::{TokenIssuer, TokenPair};
pub use jwt::generate_access_token;
pub use jwt::validate_access_token;
pub use password::{BcryptHasher, PasswordHasher};
pub use refresh_token::generate_refresh_token;
pub use refresh_token::hash_token;
pub use refresh_token::token_matches;
pub use service::AuthService;
