/// Error Handling Module
///
/// Unified error handling for the service:
/// 1. Domain-specific error types (validation, store, auth, config)
/// 2. A central `AppError` used for control flow
/// 3. HTTP response mapping with structured logging
/// 4. Request-scoped error context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every problem found in one request body, reported together
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("invalid input: {}", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Identity repository and token store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate entry: {0}")]
    Conflict(String),
    #[error("Store call timed out after {0}ms")]
    Timeout(u128),
    #[error("Store error: {0}")]
    Backend(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
    #[error("Config parse error: {0}")]
    ParseError(String),
}

/// Authentication and authorization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Refresh token absent, mismatched, rotated or revoked
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Token has expired")]
    TokenExpired,
    /// Access token failed signature, issuer or expiry checks
    #[error("Invalid token")]
    TokenInvalid,
    #[error("Missing authentication token")]
    MissingToken,
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::from(err))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict("Email already registered".to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
    /// Per-field problems, only present for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(e) => match e {
                StoreError::Conflict(_) => StatusCode::CONFLICT,
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing code and message; internal details never leave the process
    fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::Validation(e) => ("VALIDATION_ERROR", e.to_string()),
            AppError::Store(e) => match e {
                StoreError::Conflict(_) => ("DUPLICATE_ENTRY", e.to_string()),
                StoreError::NotFound(_) => ("NOT_FOUND", e.to_string()),
                StoreError::Timeout(_) => (
                    "SERVICE_UNAVAILABLE",
                    "Storage temporarily unavailable".to_string(),
                ),
                StoreError::Backend(_) => ("STORE_ERROR", "Storage error occurred".to_string()),
            },
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => {
                    ("INVALID_CREDENTIALS", "Invalid email or password".to_string())
                }
                AuthError::Unauthorized => (
                    "UNAUTHORIZED",
                    "Refresh token is not valid for this session".to_string(),
                ),
                AuthError::TokenExpired => (
                    "TOKEN_EXPIRED",
                    "Token has expired".to_string(),
                ),
                AuthError::TokenInvalid => {
                    ("TOKEN_INVALID", "Invalid token".to_string())
                }
                AuthError::MissingToken => {
                    ("MISSING_TOKEN", "Missing authentication token".to_string())
                }
            },
            AppError::Config(_) => ("CONFIG_ERROR", "Server configuration error".to_string()),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error".to_string()),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let status = self.status();
        let (code, message) = self.code_and_message();

        let mut response =
            ErrorResponse::new(request_id.to_string(), message, code.to_string(), status.as_u16());
        if let AppError::Validation(e) = self {
            response = response.with_details(e.errors.clone());
        }

        (status, response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Store(StoreError::Conflict(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Store(e) => {
                tracing::error!(request_id = request_id, error = %e, "Store error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        self.status()
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Request-scoped context attached to log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Tie `error` to this context so its response reuses `request_id`
    pub fn wrap(&self, error: AppError) -> ContextualError {
        ContextualError {
            context: self.clone(),
            error,
        }
    }

    pub fn log_error(&self, error: &AppError) {
        match error {
            AppError::Validation(_) | AppError::Auth(_) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Request rejected"
                );
            }
            _ => {
                tracing::error!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Request failed"
                );
            }
        }
    }
}

/// An `AppError` raised while handling a request. Logged once, under the
/// context's request id, which is also the `error_id` the client receives.
#[derive(Debug, Error)]
#[error("{}: {}", .context.operation, .error)]
pub struct ContextualError {
    pub context: ErrorContext,
    pub error: AppError,
}

impl ResponseError for ContextualError {
    fn error_response(&self) -> HttpResponse {
        self.context.log_error(&self.error);

        let (status, error_response) =
            ErrorHandler::error_response(&self.error, &self.context.request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        self.error.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collect() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.push("email", "is empty");
        errors.push("password", "is too short");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.to_string(), "invalid input: email is empty, password is too short");
    }

    #[test]
    fn test_auth_errors_map_to_401() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::Unauthorized,
            AuthError::TokenExpired,
            AuthError::TokenInvalid,
            AuthError::MissingToken,
        ] {
            let app_err: AppError = err.into();
            assert_eq!(app_err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_invalid_credentials_message_is_generic() {
        let (_, response) =
            ErrorHandler::error_response(&AppError::from(AuthError::InvalidCredentials), "id");
        assert_eq!(response.code, "INVALID_CREDENTIALS");
        assert_eq!(response.message, "Invalid email or password");
    }

    #[test]
    fn test_backend_details_are_hidden() {
        let err = AppError::from(StoreError::Backend("connection reset by peer".to_string()));
        let (status, response) = ErrorHandler::error_response(&err, "id");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.message.contains("connection reset"));
    }

    #[test]
    fn test_validation_response_has_details() {
        let mut errors = ValidationErrors::new();
        errors.push("email", "is empty");
        let (status, response) = ErrorHandler::error_response(&AppError::from(errors), "id");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.details.map(|d| d.len()), Some(1));
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("test_operation");
        assert_eq!(ctx.operation, "test_operation");
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }

    #[tokio::test]
    async fn test_contextual_error_reports_context_request_id() {
        let ctx = ErrorContext::new("login");
        let err = ctx.wrap(AppError::from(AuthError::InvalidCredentials));

        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let response = ResponseError::error_response(&err);
        let body = actix_web::body::to_bytes(response.into_body())
            .await
            .expect("Failed to read body");
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error_id"], ctx.request_id.as_str());
        assert_eq!(json["code"], "INVALID_CREDENTIALS");
    }
}
