//! Role management handlers
//!
//! Adding and removing roles is limited to the caller's own account. Any
//! authenticated user may designate another user as a trusted contact and
//! read role information.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::auth::{AddRoleRequest, AuthError, SessionUser, UserRolesResponse};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Extension, Json,
};
use paloma_core::RoleType;
use std::sync::Arc;
use uuid::Uuid;

/// Add a role
///
/// With `is_primary` set, the new role becomes primary and the previous
/// primary is demoted in the same transaction.
#[utoipa::path(
    post,
    path = "/api/v1/roles/add",
    tag = "roles",
    request_body = AddRoleRequest,
    responses(
        (status = 200, description = "Role added", body = UserRolesResponse),
        (status = 400, description = "Duplicate role or unknown user", body = crate::error::ApiError),
        (status = 403, description = "Target is not the caller", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<SessionUser>,
    headers: HeaderMap,
    Json(request): Json<AddRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    require_self(&caller, request.user_id, "roles/add", &context)?;

    let roles = state
        .auth
        .add_role(request.user_id, request.role_type, request.is_primary)
        .await?;
    audit_log(
        &AuditEvent::RoleChange {
            actor_id: caller.id,
            target_id: request.user_id,
            role: request.role_type,
            action: "add".to_string(),
        },
        &context,
    );

    Ok(Json(UserRolesResponse::new(
        roles,
        format!("Role {} added successfully", request.role_type),
    )))
}

/// Remove a role
///
/// The last remaining role cannot be removed. Removing the primary role
/// promotes the oldest remaining one.
#[utoipa::path(
    delete,
    path = "/api/v1/roles/remove/{user_id}/{role_type}",
    tag = "roles",
    params(
        ("user_id" = Uuid, Path, description = "User id"),
        ("role_type" = String, Path, description = "USER or TRUSTED_CONTACT")
    ),
    responses(
        (status = 200, description = "Role removed", body = UserRolesResponse),
        (status = 400, description = "Role not held, last role, or unknown user", body = crate::error::ApiError),
        (status = 403, description = "Target is not the caller", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<SessionUser>,
    headers: HeaderMap,
    Path((user_id, role_type)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    let role = parse_role(&role_type)?;
    require_self(&caller, user_id, "roles/remove", &context)?;

    let roles = state.auth.remove_role(user_id, role).await?;
    audit_log(
        &AuditEvent::RoleChange {
            actor_id: caller.id,
            target_id: user_id,
            role,
            action: "remove".to_string(),
        },
        &context,
    );

    Ok(Json(UserRolesResponse::new(
        roles,
        format!("Role {role} removed successfully"),
    )))
}

/// All roles of a user
#[utoipa::path(
    get,
    path = "/api/v1/roles/user/{user_id}",
    tag = "roles",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Role set", body = UserRolesResponse),
        (status = 400, description = "Unknown user", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_roles_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let roles = state.auth.get_roles(user_id).await?;
    Ok(Json(UserRolesResponse::new(
        roles,
        "User roles retrieved successfully",
    )))
}

/// Add TRUSTED_CONTACT to a user, never as primary
#[utoipa::path(
    post,
    path = "/api/v1/roles/make-trusted-contact/{user_id}",
    tag = "roles",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User is now a trusted contact", body = UserRolesResponse),
        (status = 400, description = "Already a trusted contact, or unknown user", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn make_trusted_contact_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<SessionUser>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let roles = state.auth.make_trusted_contact(user_id).await?;
    audit_log(
        &AuditEvent::RoleChange {
            actor_id: caller.id,
            target_id: user_id,
            role: RoleType::TrustedContact,
            action: "add".to_string(),
        },
        &AuditContext::from_headers(&headers),
    );

    Ok(Json(UserRolesResponse::new(
        roles,
        "User is now a trusted contact",
    )))
}

/// Whether a user holds a role; false for unknown users
#[utoipa::path(
    get,
    path = "/api/v1/roles/check/{user_id}/has-role/{role_type}",
    tag = "roles",
    params(
        ("user_id" = Uuid, Path, description = "User id"),
        ("role_type" = String, Path, description = "USER or TRUSTED_CONTACT")
    ),
    responses(
        (status = 200, description = "Check result", body = bool),
        (status = 400, description = "Unknown role type", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn has_role_handler(
    State(state): State<Arc<AppState>>,
    Path((user_id, role_type)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let role = parse_role(&role_type)?;
    Ok(Json(state.auth.has_role(user_id, role).await?))
}

/// Whether a user holds both USER and TRUSTED_CONTACT
#[utoipa::path(
    get,
    path = "/api/v1/roles/check/{user_id}/has-both-roles",
    tag = "roles",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Check result", body = bool),
    ),
    security(("bearer_auth" = []))
)]
pub async fn has_both_roles_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.auth.has_both_roles(user_id).await?))
}

fn parse_role(raw: &str) -> Result<RoleType, AppError> {
    raw.parse::<RoleType>()
        .map_err(|e| AuthError::Validation(e.to_string()).into())
}

fn require_self(
    caller: &SessionUser,
    target: Uuid,
    resource: &str,
    context: &AuditContext,
) -> Result<(), AppError> {
    if caller.id == target {
        return Ok(());
    }

    audit_log(
        &AuditEvent::AccessDenied {
            user_id: caller.id,
            resource: resource.to_string(),
        },
        context,
    );
    Err(AuthError::Forbidden("Roles can only be changed on your own account".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_accepts_path_spellings() {
        assert_eq!(parse_role("USER").unwrap(), RoleType::User);
        assert_eq!(parse_role("trusted-contact").unwrap(), RoleType::TrustedContact);
        assert!(matches!(parse_role("ADMIN"), Err(AppError::BadRequest(_))));
    }
}
