//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, field::FieldError, kind::ErrorKind};
use platform::password::PasswordHashError;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request body failed validation
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Email already registered
    #[error("Email already registered")]
    DuplicateEmail,

    /// Unknown email or wrong password (deliberately indistinguishable)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Missing, malformed, tampered or expired token
    #[error("Authentication required")]
    InvalidToken,

    /// Authenticated but the role is not sufficient
    #[error("Insufficient role")]
    InsufficientRole,

    /// Caller may not assign the requested role
    #[error("Not allowed to assign the requested role")]
    RoleAssignmentForbidden,

    /// Password hashing failed
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Sliding-window limit reached
    #[error("Too many requests")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Request classified as automated
    #[error("Automated requests are not allowed")]
    BotDetected,

    /// Request matched an attack pattern
    #[error("Request blocked")]
    ShieldBlocked,

    /// Admission control could not decide (fail-closed)
    #[error("Service temporarily unavailable")]
    AdmissionUnavailable,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) => ErrorKind::BadRequest,
            AuthError::DuplicateEmail => ErrorKind::Conflict,
            AuthError::InvalidCredentials | AuthError::InvalidToken => ErrorKind::Unauthorized,
            AuthError::InsufficientRole
            | AuthError::RoleAssignmentForbidden
            | AuthError::BotDetected
            | AuthError::ShieldBlocked => ErrorKind::Forbidden,
            AuthError::RateLimitExceeded { .. } => ErrorKind::TooManyRequests,
            AuthError::AdmissionUnavailable => ErrorKind::ServiceUnavailable,
            AuthError::Hashing(_) | AuthError::Database(_) | AuthError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Convert to AppError
    ///
    /// Server faults keep their detail as the error source only; the
    /// rendered message stays generic.
    pub fn into_app_error(self) -> AppError {
        match self {
            AuthError::Validation(errors) => {
                AppError::bad_request("Validation failed").with_field_errors(errors)
            }
            AuthError::InvalidToken => {
                AppError::unauthorized("Authentication required").with_action("Sign in again")
            }
            AuthError::RateLimitExceeded { retry_after_secs } => {
                AppError::too_many_requests("Too many requests")
                    .with_action(format!("Retry after {} seconds", retry_after_secs))
            }
            AuthError::Database(e) => {
                let app_error = AppError::from(e);
                // Unique violations are mapped to DuplicateEmail by the store;
                // anything reaching here is a server fault.
                if app_error.kind() == ErrorKind::Conflict {
                    AppError::internal("Internal server error")
                } else {
                    app_error
                }
            }
            AuthError::Hashing(_) | AuthError::Internal(_) => {
                AppError::internal("Internal server error")
            }
            other => AppError::new(other.kind(), other.to_string()),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Hashing(msg) => {
                tracing::error!(message = %msg, "Password hashing error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::AdmissionUnavailable => {
                tracing::error!("Admission control unavailable, failing closed");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::BotDetected | AuthError::ShieldBlocked => {
                tracing::warn!(error = %self, "Request rejected by admission");
            }
            AuthError::RateLimitExceeded { retry_after_secs } => {
                tracing::info!(retry_after_secs, "Rate limit exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();

        let retry_after = match &self {
            AuthError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let mut response = self.into_app_error().into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<PasswordHashError> for AuthError {
    fn from(err: PasswordHashError) -> Self {
        AuthError::Hashing(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::Validation(vec![]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::DuplicateEmail.status_code(), StatusCode::CONFLICT);
        assert_eq!(AuthError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InsufficientRole.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::BotDetected.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::RateLimitExceeded { retry_after_secs: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::AdmissionUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_server_faults_render_generic_message() {
        let app_error = AuthError::Hashing("argon2 params rejected".into()).into_app_error();
        assert_eq!(app_error.message(), "Internal server error");

        let app_error = AuthError::Internal("pool poisoned".into()).into_app_error();
        assert!(!app_error.to_string().contains("poisoned"));
    }

    #[test]
    fn test_validation_keeps_field_errors() {
        let app_error =
            AuthError::Validation(vec![FieldError::required("email")]).into_app_error();
        assert_eq!(app_error.field_errors().len(), 1);
        assert_eq!(app_error.field_errors()[0].field, "email");
    }

    #[test]
    fn test_rate_limit_response_has_retry_after() {
        let response = AuthError::RateLimitExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
