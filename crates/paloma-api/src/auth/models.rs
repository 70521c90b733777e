//! Request and response bodies for the auth, session and role endpoints

use chrono::{DateTime, Utc};
use paloma_core::{RoleType, User, UserRoles};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Registration request
#[derive(Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// 3-100 characters, no whitespace or '@'
    #[validate(length(min = 3, max = 100, message = "Username must be 3-100 characters"))]
    pub username: String,

    #[validate(
        email(message = "Invalid email address"),
        length(max = 200, message = "Email must be at most 200 characters")
    )]
    pub email: String,

    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    pub full_name: Option<String>,

    pub password: String,

    /// Defaults to USER
    #[serde(default)]
    pub role_type: Option<RoleType>,
}

/// Login request; `identifier` is an email address or a username
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    pub identifier: String,
    pub password: String,
}

/// Refresh request; the token may also be sent in the `X-Refresh-Token` header
#[derive(Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// Secrets in request bodies never reach Debug output

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password", &"<redacted>")
            .field("role_type", &self.role_type)
            .finish()
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Debug for UpdatePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatePasswordRequest")
            .field("old_password", &"<redacted>")
            .field("new_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateEmailRequest {
    #[validate(
        email(message = "Invalid email address"),
        length(max = 200, message = "Email must be at most 200 characters")
    )]
    pub new_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUsernameRequest {
    #[validate(length(min = 3, max = 100, message = "Username must be 3-100 characters"))]
    pub new_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddRoleRequest {
    pub user_id: Uuid,
    pub role_type: RoleType,
    #[serde(default)]
    pub is_primary: bool,
}

/// Token response for login and refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Only present on login; refresh does not rotate the refresh token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub message: String,
}

impl TokenResponse {
    pub fn bearer(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            message: message.into(),
        }
    }
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserSummary,
    pub message: String,
}

/// Caller's profile with their role set
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserSummary,
    pub roles: Vec<RoleType>,
    pub primary_role: Option<RoleType>,
}

/// A user's full role set after a role operation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRolesResponse {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<RoleType>,
    pub primary_role: Option<RoleType>,
    pub message: String,
}

impl UserRolesResponse {
    pub fn new(roles: UserRoles, message: impl Into<String>) -> Self {
        Self {
            user_id: roles.user_id,
            username: roles.username,
            roles: roles.roles,
            primary_role: roles.primary_role,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
