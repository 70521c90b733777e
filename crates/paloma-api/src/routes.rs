//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::require_session;
use crate::handlers::{auth, roles, session};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route(
            "/session/logout",
            post(session::logout_handler).delete(session::logout_handler),
        )
        .route("/session/update/password", put(session::update_password_handler))
        .route("/session/update/email", put(session::update_email_handler))
        .route("/session/update/username", put(session::update_username_handler))
        .route("/session/me", get(session::me_handler))
        .route("/session/account", delete(session::delete_account_handler))
        // Role endpoints
        .route("/roles/add", post(roles::add_role_handler))
        .route(
            "/roles/remove/:user_id/:role_type",
            delete(roles::remove_role_handler),
        )
        .route("/roles/user/:user_id", get(roles::get_user_roles_handler))
        .route(
            "/roles/make-trusted-contact/:user_id",
            post(roles::make_trusted_contact_handler),
        )
        .route(
            "/roles/check/:user_id/has-role/:role_type",
            get(roles::has_role_handler),
        )
        .route(
            "/roles/check/:user_id/has-both-roles",
            get(roles::has_both_roles_handler),
        )
        .layer(middleware::from_fn_with_state(state, require_session));

    Router::new().merge(public_routes).merge(protected_routes)
}
