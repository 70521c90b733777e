/// Session authorization middleware for protected routes
///
/// Extracts the bearer token from the Authorization header, verifies it, and
/// resolves the user it was issued to. On success the user is added to the
/// request extensions as [`SessionUser`].
use super::error::AuthError;
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use paloma_core::User;
use std::sync::Arc;

/// The caller of a protected route
///
/// Extract it in handlers with `Extension<SessionUser>`.
#[derive(Debug, Clone)]
pub struct SessionUser(pub User);

impl std::ops::Deref for SessionUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Require a valid session
///
/// - missing or malformed header: 401
/// - token fails verification: 401
/// - token valid but the user is gone: 404
///
/// # Usage
///
/// ```ignore
/// let protected = Router::new()
///     .route("/session/me", get(session::me_handler))
///     .layer(middleware::from_fn_with_state(state.clone(), require_session));
/// ```
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let verified = match bearer_token(request.headers()) {
        None => Err("missing or malformed Authorization header".to_string()),
        Some(token) => state.auth.signer().verify(token).map_err(|e| e.to_string()),
    };

    let user_id = match verified {
        Ok(user_id) => user_id,
        Err(reason) => {
            audit_log(
                &AuditEvent::InvalidToken { reason },
                &AuditContext::from_headers(request.headers()),
            );
            return Err(AuthError::Unauthorized.into());
        }
    };

    let user = state
        .auth
        .find_user(user_id)
        .await?
        .ok_or(AuthError::NotFound)?;

    request.extensions_mut().insert(SessionUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_non_utf8_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap(),
        );
        assert_eq!(bearer_token(&headers), None);
    }
}
