//! Storage abstraction for identity, credential, role, and refresh token records
//!
//! Every method is a single atomic unit against the backing store. Methods that
//! touch more than one record (account creation, login bookkeeping, role
//! changes) commit all of their writes or none of them.

use crate::roles::RoleRuleError;
use crate::{Credential, NewAccount, RefreshToken, RoleAssignment, RoleType, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("An account with this email already exists")]
    DuplicateEmail,

    #[error("An account with this username already exists")]
    DuplicateUsername,

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Role(#[from] RoleRuleError),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Persistence for users and the records they own
#[async_trait]
pub trait AuthRepository: Send + Sync {
    /// Check that the backing store is reachable
    async fn ping(&self) -> Result<()>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Insert user, credential, and first role assignment together
    ///
    /// Fails with `DuplicateEmail` / `DuplicateUsername` without writing
    /// anything when either value is already taken.
    async fn create_account(&self, account: &NewAccount) -> Result<RoleAssignment>;

    async fn update_email(&self, user_id: Uuid, email: &str) -> Result<()>;

    async fn update_username(&self, user_id: Uuid, username: &str) -> Result<()>;

    /// Delete a user and everything it owns; `false` if there was no such user
    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;

    async fn find_credential(&self, user_id: Uuid) -> Result<Option<Credential>>;

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;

    /// Set `last_login` and make `token` the user's only refresh token
    async fn record_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        token: &RefreshToken,
    ) -> Result<()>;

    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>>;

    async fn find_refresh_token_for_user(&self, user_id: Uuid) -> Result<Option<RefreshToken>>;

    /// Delete one refresh token by digest; `false` if it was already gone
    async fn delete_refresh_token(&self, token_hash: &str) -> Result<bool>;

    /// Delete every refresh token of a user, returning how many were removed
    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64>;

    /// Role assignments of a user, oldest first
    async fn list_role_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>>;

    /// Add a role following [`crate::roles::plan_addition`]
    async fn add_role(
        &self,
        user_id: Uuid,
        role: RoleType,
        requested_primary: bool,
    ) -> Result<RoleAssignment>;

    /// Remove a role following [`crate::roles::plan_removal`], returning the
    /// remaining assignments
    async fn remove_role(&self, user_id: Uuid, role: RoleType) -> Result<Vec<RoleAssignment>>;
}
