//! Authentication domain errors
//!
//! Authentication failures carry fixed messages so that callers cannot tell
//! which check failed.

use super::jwt::JwtError;
use super::password::PasswordError;
use paloma_core::{RepositoryError, RoleRuleError, RoleType};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("There is already an account with this email address")]
    DuplicateEmail,

    #[error("There is already an account with this username")]
    DuplicateUsername,

    /// Unknown identifier, missing credential and wrong password alike
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Unknown, expired, or forged refresh token
    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("User already has role: {0}")]
    DuplicateRole(RoleType),

    #[error("User does not have role: {0}")]
    RoleNotFound(RoleType),

    #[error("Cannot remove role - user must have at least one role")]
    LastRole,

    /// Missing or malformed bearer header, or an access token that fails verification
    #[error("Invalid or expired token")]
    Unauthorized,

    /// The access token is valid but its user no longer exists
    #[error("User not found")]
    NotFound,

    /// A user addressed by id in a request body or path does not exist
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => AuthError::DuplicateEmail,
            RepositoryError::DuplicateUsername => AuthError::DuplicateUsername,
            RepositoryError::UserNotFound(id) => AuthError::UserNotFound(id),
            RepositoryError::Role(rule) => rule.into(),
            RepositoryError::Corrupt(msg) => AuthError::Internal(format!("Corrupt record: {msg}")),
            RepositoryError::Database(e) => AuthError::Internal(format!("Database error: {e}")),
        }
    }
}

impl From<RoleRuleError> for AuthError {
    fn from(err: RoleRuleError) -> Self {
        match err {
            RoleRuleError::DuplicateRole(role) => AuthError::DuplicateRole(role),
            RoleRuleError::RoleNotFound(role) => AuthError::RoleNotFound(role),
            RoleRuleError::LastRole => AuthError::LastRole,
            RoleRuleError::NoPromotionCandidate => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<JwtError> for AuthError {
    /// Only signing can fail outside of verification; verification failures
    /// are mapped explicitly by the caller
    fn from(err: JwtError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Internal(format!("Background task failed: {err}"))
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AuthError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_messages_are_fixed() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(AuthError::InvalidToken.to_string(), "Invalid refresh token");
    }

    #[test]
    fn test_repository_error_mapping() {
        assert!(matches!(
            AuthError::from(RepositoryError::Role(RoleRuleError::LastRole)),
            AuthError::LastRole
        ));
        assert!(matches!(
            AuthError::from(RepositoryError::DuplicateUsername),
            AuthError::DuplicateUsername
        ));
        assert!(matches!(
            AuthError::from(RepositoryError::Role(RoleRuleError::NoPromotionCandidate)),
            AuthError::Internal(_)
        ));
    }
}
