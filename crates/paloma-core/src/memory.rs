//! In-memory repository
//!
//! Backs tests and local runs without PostgreSQL. All tables sit behind one
//! lock and every operation takes it exactly once, so each call is atomic in
//! the same way a database transaction is.

use crate::roles::{plan_addition, plan_removal};
use crate::store::{AuthRepository, RepositoryError, Result};
use crate::{Credential, NewAccount, RefreshToken, RoleAssignment, RoleType, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    credentials: HashMap<Uuid, Credential>,
    roles: Vec<RoleAssignment>,
    /// Keyed by user id: one refresh token per user
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    next_seq: i64,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn assignments_of(&self, user_id: Uuid) -> Vec<RoleAssignment> {
        let mut found: Vec<RoleAssignment> = self
            .roles
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.seq);
        found
    }

    fn next_seq(&mut self) -> i64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Repository holding everything in process memory
#[derive(Default)]
pub struct MemoryAuthStore {
    tables: RwLock<Tables>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Number of stored credentials
    pub async fn credential_count(&self) -> usize {
        self.tables.read().await.credentials.len()
    }

    /// Number of stored role assignments across all users
    pub async fn role_count(&self) -> usize {
        self.tables.read().await.roles.len()
    }

    /// Insert a refresh token row as-is, bypassing login bookkeeping
    pub async fn insert_refresh_token(&self, token: RefreshToken) {
        self.tables
            .write()
            .await
            .refresh_tokens
            .insert(token.user_id, token);
    }
}

#[async_trait]
impl AuthRepository for MemoryAuthStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<RoleAssignment> {
        let mut tables = self.tables.write().await;

        if tables.email_taken(&account.user.email, None) {
            return Err(RepositoryError::DuplicateEmail);
        }
        if tables.username_taken(&account.user.username, None) {
            return Err(RepositoryError::DuplicateUsername);
        }

        let plan = plan_addition(&[], account.role_type, account.is_primary)?;
        let assignment = RoleAssignment {
            user_id: account.user.id,
            role_type: account.role_type,
            is_primary: plan.is_primary,
            seq: tables.next_seq(),
            created_at: account.user.created_at,
        };

        tables.users.insert(account.user.id, account.user.clone());
        tables
            .credentials
            .insert(account.user.id, account.credential.clone());
        tables.roles.push(assignment.clone());

        Ok(assignment)
    }

    async fn update_email(&self, user_id: Uuid, email: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(email, Some(user_id)) {
            return Err(RepositoryError::DuplicateEmail);
        }
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(RepositoryError::UserNotFound(user_id))?;
        user.email = email.to_string();
        Ok(())
    }

    async fn update_username(&self, user_id: Uuid, username: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.username_taken(username, Some(user_id)) {
            return Err(RepositoryError::DuplicateUsername);
        }
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(RepositoryError::UserNotFound(user_id))?;
        user.username = username.to_string();
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }
        tables.credentials.remove(&user_id);
        tables.roles.retain(|a| a.user_id != user_id);
        tables.refresh_tokens.remove(&user_id);
        Ok(true)
    }

    async fn find_credential(&self, user_id: Uuid) -> Result<Option<Credential>> {
        Ok(self.tables.read().await.credentials.get(&user_id).cloned())
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let credential = tables
            .credentials
            .get_mut(&user_id)
            .ok_or(RepositoryError::UserNotFound(user_id))?;
        credential.password_hash = password_hash.to_string();
        credential.updated_at = Utc::now();
        Ok(())
    }

    async fn record_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        token: &RefreshToken,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(RepositoryError::UserNotFound(user_id))?;
        user.last_login = Some(at);
        tables.refresh_tokens.insert(user_id, token.clone());
        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn find_refresh_token_for_user(&self, user_id: Uuid) -> Result<Option<RefreshToken>> {
        Ok(self.tables.read().await.refresh_tokens.get(&user_id).cloned())
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|_, t| t.token_hash != token_hash);
        Ok(tables.refresh_tokens.len() < before)
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(tables.refresh_tokens.remove(&user_id).map_or(0, |_| 1))
    }

    async fn list_role_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
        Ok(self.tables.read().await.assignments_of(user_id))
    }

    async fn add_role(
        &self,
        user_id: Uuid,
        role: RoleType,
        requested_primary: bool,
    ) -> Result<RoleAssignment> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(RepositoryError::UserNotFound(user_id));
        }

        let existing = tables.assignments_of(user_id);
        let plan = plan_addition(&existing, role, requested_primary)?;

        if plan.demote_existing {
            for a in tables.roles.iter_mut().filter(|a| a.user_id == user_id) {
                a.is_primary = false;
            }
        }

        let assignment = RoleAssignment {
            user_id,
            role_type: role,
            is_primary: plan.is_primary,
            seq: tables.next_seq(),
            created_at: Utc::now(),
        };
        tables.roles.push(assignment.clone());
        Ok(assignment)
    }

    async fn remove_role(&self, user_id: Uuid, role: RoleType) -> Result<Vec<RoleAssignment>> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(RepositoryError::UserNotFound(user_id));
        }

        let existing = tables.assignments_of(user_id);
        let plan = plan_removal(&existing, role)?;

        tables
            .roles
            .retain(|a| !(a.user_id == user_id && a.role_type == role));
        if let Some(promote) = plan.promote {
            for a in tables.roles.iter_mut().filter(|a| a.user_id == user_id) {
                a.is_primary = a.role_type == promote;
            }
        }

        Ok(tables.assignments_of(user_id))
    }
}
