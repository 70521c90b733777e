//! Session handlers for the authenticated caller
//!
//! Every route here sits behind [`crate::auth::require_session`] and acts on
//! the caller's own account.

use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::auth::{
    AuthError, MessageResponse, ProfileResponse, SessionUser, UpdateEmailRequest, UpdatePasswordRequest,
    UpdateUsernameRequest, UserSummary,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Extension, Json};
use std::sync::Arc;

/// Logout
///
/// Revokes the caller's refresh token. Access tokens already issued remain
/// valid until they expire. Logging out twice is not an error.
#[utoipa::path(
    post,
    path = "/api/v1/session/logout",
    tag = "session",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let revoked_tokens = state.auth.logout(user.id).await?;
    audit_log(
        &AuditEvent::Logout {
            user_id: user.id,
            revoked_tokens,
        },
        &AuditContext::from_headers(&headers),
    );

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Change password
#[utoipa::path(
    put,
    path = "/api/v1/session/update/password",
    tag = "session",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "New password too weak", body = crate::error::ApiError),
        (status = 401, description = "Current password is wrong", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    headers: HeaderMap,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .auth
        .update_password(user.id, &request.old_password, &request.new_password)
        .await;

    audit_log(
        &AuditEvent::PasswordChange {
            user_id: user.id,
            success: result.is_ok(),
        },
        &AuditContext::from_headers(&headers),
    );
    result?;

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// Change email address
#[utoipa::path(
    put,
    path = "/api/v1/session/update/email",
    tag = "session",
    request_body = UpdateEmailRequest,
    responses(
        (status = 200, description = "Email updated", body = UserSummary),
        (status = 400, description = "Invalid or taken email", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_email_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    headers: HeaderMap,
    Json(request): Json<UpdateEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.auth.update_email(user.id, &request.new_email).await?;
    audit_log(
        &AuditEvent::ProfileChange {
            user_id: user.id,
            field: "email".to_string(),
        },
        &AuditContext::from_headers(&headers),
    );

    Ok(Json(UserSummary::from(updated)))
}

/// Change username
#[utoipa::path(
    put,
    path = "/api/v1/session/update/username",
    tag = "session",
    request_body = UpdateUsernameRequest,
    responses(
        (status = 200, description = "Username updated", body = UserSummary),
        (status = 400, description = "Invalid or taken username", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_username_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    headers: HeaderMap,
    Json(request): Json<UpdateUsernameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state
        .auth
        .update_username(user.id, &request.new_username)
        .await?;
    audit_log(
        &AuditEvent::ProfileChange {
            user_id: user.id,
            field: "username".to_string(),
        },
        &AuditContext::from_headers(&headers),
    );

    Ok(Json(UserSummary::from(updated)))
}

/// Current user profile with roles
#[utoipa::path(
    get,
    path = "/api/v1/session/me",
    tag = "session",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "User no longer exists", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Result<impl IntoResponse, AppError> {
    let roles = state.auth.get_roles(user.id).await.map_err(gone_as_not_found)?;

    Ok(Json(ProfileResponse {
        user: user.0.into(),
        roles: roles.roles,
        primary_role: roles.primary_role,
    }))
}

/// Delete the caller's account
///
/// Removes the credential, role assignments and refresh token along with
/// the user.
#[utoipa::path(
    delete,
    path = "/api/v1/session/account",
    tag = "session",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "User no longer exists", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .delete_user(user.id)
        .await
        .map_err(gone_as_not_found)?;
    audit_log(
        &AuditEvent::AccountDeleted { user_id: user.id },
        &AuditContext::from_headers(&headers),
    );

    Ok(Json(MessageResponse::new("Account deleted")))
}

/// The caller was deleted after the session check passed
fn gone_as_not_found(err: AuthError) -> AuthError {
    match err {
        AuthError::UserNotFound(_) => AuthError::NotFound,
        other => other,
    }
}
