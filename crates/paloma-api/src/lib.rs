//! Paloma API - REST server for authentication, sessions and roles
//!
//! Provides HTTP endpoints for registration, login, token refresh, session
//! management and role assignment, plus health probes and OpenAPI docs.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use crate::handlers::health::{health_check, readiness_check};
use crate::middleware::{request_counter_middleware, security_headers_middleware};
use crate::state::AppState;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Paloma API",
        description = "Authentication, session and role management"
    ),
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::session::logout_handler,
        handlers::session::update_password_handler,
        handlers::session::update_email_handler,
        handlers::session::update_username_handler,
        handlers::session::me_handler,
        handlers::session::delete_account_handler,
        handlers::roles::add_role_handler,
        handlers::roles::remove_role_handler,
        handlers::roles::get_user_roles_handler,
        handlers::roles::make_trusted_contact_handler,
        handlers::roles::has_role_handler,
        handlers::roles::has_both_roles_handler,
    ),
    components(schemas(
        paloma_core::RoleType,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::UpdatePasswordRequest,
        auth::UpdateEmailRequest,
        auth::UpdateUsernameRequest,
        auth::AddRoleRequest,
        auth::TokenResponse,
        auth::UserSummary,
        auth::RegisterResponse,
        auth::ProfileResponse,
        auth::UserRolesResponse,
        auth::MessageResponse,
        error::ApiError,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "session", description = "The caller's own session and account"),
        (name = "roles", description = "Role assignment and checks"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            request_counter_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router over an in-memory store, for tests
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::for_testing()))
}

/// An empty origin list allows same-origin requests only
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(handlers::auth::REFRESH_TOKEN_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    if origins.is_empty() {
        return base;
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(origins).allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/auth/login"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/session/me"));
        assert!(paths
            .iter()
            .any(|p| p.as_str() == "/api/v1/roles/check/{user_id}/has-both-roles"));
        assert_eq!(paths.len(), 17);
    }

    #[test]
    fn test_openapi_has_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
