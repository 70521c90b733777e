//! Authentication and authorization module
//!
//! - Token signing and verification (HS256)
//! - Password hashing with Argon2id
//! - Authentication service for accounts, sessions and roles
//! - Session middleware for protected routes
//! - Request and response bodies

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use error::AuthError;
pub use jwt::{Claims, IssuedToken, JwtError, TokenSigner, TokenUse};
pub use middleware::{bearer_token, require_session, SessionUser};
pub use models::{
    AddRoleRequest, LoginRequest, MessageResponse, ProfileResponse, RefreshRequest,
    RegisterRequest, RegisterResponse, TokenResponse, UpdateEmailRequest, UpdatePasswordRequest,
    UpdateUsernameRequest, UserRolesResponse, UserSummary,
};
pub use password::{hash_password_with_config, validate_password_strength, verify_password, PasswordConfig};
pub use service::{hash_token, AuthService, LoginTokens};
