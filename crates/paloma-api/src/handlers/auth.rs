//! Authentication API handlers
//!
//! Registration, login and access token refresh. None of these require a
//! bearer token.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::auth::{
    AuthError, LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse, TokenResponse,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use paloma_core::RoleType;
use std::sync::Arc;

/// Header carrying the refresh token when the body does not
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Register a new user account
///
/// Creates the user, its credential and its first role assignment in one
/// transaction. The role defaults to USER, which becomes the primary role.
///
/// # Responses
///
/// * `201 Created` - User registered
/// * `400 Bad Request` - Invalid input, or email/username already taken
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Invalid input or duplicate account", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    let username = request.username.clone();
    let role = request.role_type.unwrap_or(RoleType::User);

    let user = match state.auth.register(request).await {
        Ok(user) => user,
        Err(e) => {
            audit_log(
                &AuditEvent::RegistrationFailure {
                    username,
                    reason: e.to_string(),
                },
                &context,
            );
            return Err(e.into());
        }
    };

    audit_log(
        &AuditEvent::RegistrationSuccess {
            user_id: user.id,
            username: user.username.clone(),
            role,
        },
        &context,
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            message: "User registered successfully".to_string(),
        }),
    ))
}

/// Login with an email address or username
///
/// Returns an access token and a refresh token. Any previous refresh token
/// of the user stops working.
///
/// # Responses
///
/// * `200 OK` - Authentication successful
/// * `401 Unauthorized` - Invalid credentials
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);

    let result = state.auth.login(&request.identifier, &request.password).await;
    match result {
        Ok(tokens) => {
            audit_log(&AuditEvent::LoginSuccess { user_id: tokens.user.id }, &context);
            Ok(Json(TokenResponse::bearer(
                tokens.access_token.token,
                Some(tokens.refresh_token.token),
                state.auth.signer().access_ttl().num_seconds(),
                "Login successful",
            )))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::LoginFailure {
                    identifier: request.identifier,
                    reason: e.to_string(),
                },
                &context,
            );
            Err(e.into())
        }
    }
}

/// Refresh access token
///
/// Exchanges a refresh token, sent in the body or in the `X-Refresh-Token`
/// header, for a new access token. The refresh token itself stays valid.
///
/// # Responses
///
/// * `200 OK` - New access token issued
/// * `401 Unauthorized` - Unknown, expired or revoked refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body(content = RefreshRequest, description = "Optional when the X-Refresh-Token header is set"),
    params(
        ("X-Refresh-Token" = Option<String>, Header, description = "Refresh token")
    ),
    responses(
        (status = 200, description = "Access token refreshed", body = TokenResponse),
        (status = 400, description = "Malformed body", body = crate::error::ApiError),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let context = AuditContext::from_headers(&headers);
    let request = parse_refresh_body(&body)?;

    let token = request
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            headers
                .get(REFRESH_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    let Some(token) = token else {
        audit_log(
            &AuditEvent::TokenRefreshFailure {
                reason: "no refresh token supplied".to_string(),
            },
            &context,
        );
        return Err(AuthError::InvalidToken.into());
    };

    match state.auth.refresh(&token).await {
        Ok((user_id, access_token)) => {
            audit_log(&AuditEvent::TokenRefresh { user_id }, &context);
            Ok(Json(TokenResponse::bearer(
                access_token.token,
                None,
                state.auth.signer().access_ttl().num_seconds(),
                "Token refreshed successfully",
            )))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::TokenRefreshFailure {
                    reason: e.to_string(),
                },
                &context,
            );
            Err(e.into())
        }
    }
}

/// An empty body is allowed; the token may come from the header instead
fn parse_refresh_body(body: &[u8]) -> Result<RefreshRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RefreshRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refresh_body() {
        assert!(parse_refresh_body(b"").unwrap().refresh_token.is_none());
        assert!(parse_refresh_body(b"  \n").unwrap().refresh_token.is_none());
        assert_eq!(
            parse_refresh_body(br#"{"refresh_token":"abc"}"#)
                .unwrap()
                .refresh_token
                .as_deref(),
            Some("abc")
        );
        assert!(parse_refresh_body(b"{not json").is_err());
    }
}
