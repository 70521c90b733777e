//! Authentication service
//!
//! The only component that writes credentials, role assignments and refresh
//! tokens. Collaborators are passed in at construction; the service itself
//! keeps no mutable state between calls.
//!
//! Login identifiers are resolved deterministically: an identifier containing
//! '@' is looked up as an email address, anything else as a username.
//! Usernames may not contain '@', so the two never overlap.

use super::error::AuthError;
use super::jwt::{IssuedToken, TokenSigner};
use super::models::RegisterRequest;
use super::password::{
    hash_password_with_config, validate_password_strength, verify_password, PasswordConfig,
};
use chrono::Utc;
use paloma_core::{
    AuthRepository, Credential, NewAccount, RefreshToken, RoleType, User, UserRoles,
};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Tokens handed out by a successful login
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub user: User,
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
}

/// Authentication service
pub struct AuthService {
    repo: Arc<dyn AuthRepository>,
    signer: Arc<TokenSigner>,
    password_config: PasswordConfig,
    /// Verified against when there is no real hash, so failures cost the same
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn AuthRepository>,
        signer: Arc<TokenSigner>,
        password_config: PasswordConfig,
    ) -> Result<Self, AuthError> {
        let filler: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        let dummy_hash = hash_password_with_config(&filler, &password_config)?;

        Ok(Self {
            repo,
            signer,
            password_config,
            dummy_hash,
        })
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn repository(&self) -> &Arc<dyn AuthRepository> {
        &self.repo
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Register a new user
    ///
    /// Uniqueness is checked before anything is written; user, credential and
    /// role assignment are then committed together.
    pub async fn register(&self, mut request: RegisterRequest) -> Result<User, AuthError> {
        request.username = request.username.trim().to_string();
        request.email = normalize_email(&request.email);
        request.full_name = request
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        request.validate()?;
        validate_username(&request.username).map_err(AuthError::Validation)?;
        validate_password_strength(&request.password).map_err(AuthError::Validation)?;

        if self.repo.find_user_by_email(&request.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }
        if self
            .repo
            .find_user_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateUsername);
        }

        let password_hash = self.hash(request.password).await?;

        let role_type = request.role_type.unwrap_or(RoleType::User);
        let user = User::new(request.username, request.email, request.full_name);
        let account = NewAccount {
            credential: Credential::new(user.id, password_hash),
            role_type,
            is_primary: role_type == RoleType::User,
            user,
        };

        self.repo.create_account(&account).await?;
        tracing::info!(user_id = %account.user.id, role = %role_type, "Registered user");

        Ok(account.user)
    }

    /// Look up a user by id
    pub async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.repo.find_user_by_id(user_id).await?)
    }

    /// Fetch a user by id, failing with `UserNotFound`
    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.find_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound(user_id))
    }

    pub async fn update_email(&self, user_id: Uuid, new_email: &str) -> Result<User, AuthError> {
        let email = normalize_email(new_email);
        super::models::UpdateEmailRequest {
            new_email: email.clone(),
        }
        .validate()?;

        self.repo.update_email(user_id, &email).await?;
        self.get_user(user_id).await
    }

    pub async fn update_username(
        &self,
        user_id: Uuid,
        new_username: &str,
    ) -> Result<User, AuthError> {
        let username = new_username.trim();
        super::models::UpdateUsernameRequest {
            new_username: username.to_string(),
        }
        .validate()?;
        validate_username(username).map_err(AuthError::Validation)?;

        self.repo.update_username(user_id, username).await?;
        self.get_user(user_id).await
    }

    /// Delete a user with its credential, roles and refresh token
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        if self.repo.delete_user(user_id).await? {
            Ok(())
        } else {
            Err(AuthError::UserNotFound(user_id))
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Authenticate with an email address or username
    ///
    /// Every failure is `InvalidCredentials`. On success `last_login` is set
    /// and the user's refresh token is replaced in the same store operation.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginTokens, AuthError> {
        let user = self.resolve_identifier(identifier).await?;

        let stored_hash = match &user {
            Some(user) => self
                .repo
                .find_credential(user.id)
                .await?
                .map(|c| c.password_hash),
            None => None,
        };

        let (user, stored_hash) = match (user, stored_hash) {
            (Some(user), Some(hash)) => (user, hash),
            _ => {
                // Same hashing work as a real check
                let _ = self.verify(password, self.dummy_hash.clone()).await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        match self.verify(password, stored_hash).await {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::InvalidCredentials),
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Stored password hash is unusable");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let access_token = self.signer.issue_access_token(user.id)?;
        let refresh_token = self.signer.issue_refresh_token(user.id)?;

        let now = Utc::now();
        let record = RefreshToken {
            user_id: user.id,
            token_hash: hash_token(&refresh_token.token),
            expires_at: refresh_token.expires_at,
            created_at: now,
        };
        self.repo.record_login(user.id, now, &record).await?;

        let user = User {
            last_login: Some(now),
            ..user
        };

        Ok(LoginTokens {
            user,
            access_token,
            refresh_token,
        })
    }

    async fn resolve_identifier(&self, identifier: &str) -> Result<Option<User>, AuthError> {
        let identifier = identifier.trim();
        if identifier.contains('@') {
            Ok(self
                .repo
                .find_user_by_email(&normalize_email(identifier))
                .await?)
        } else {
            Ok(self.repo.find_user_by_username(identifier).await?)
        }
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token itself is not rotated. An expired token found here
    /// is deleted.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(Uuid, IssuedToken), AuthError> {
        let token_hash = hash_token(refresh_token.trim());

        let record = self
            .repo
            .find_refresh_token(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !record.is_live_at(Utc::now()) {
            self.repo.delete_refresh_token(&token_hash).await?;
            tracing::debug!(user_id = %record.user_id, "Deleted expired refresh token");
            return Err(AuthError::InvalidToken);
        }

        match self.signer.verify_refresh(refresh_token.trim()) {
            Ok(user_id) if user_id == record.user_id => {}
            _ => return Err(AuthError::InvalidToken),
        }

        let access_token = self.signer.issue_access_token(record.user_id)?;
        Ok((record.user_id, access_token))
    }

    /// Revoke every refresh token of a user; calling it again is a no-op
    pub async fn logout(&self, user_id: Uuid) -> Result<u64, AuthError> {
        Ok(self.repo.delete_refresh_tokens_for_user(user_id).await?)
    }

    /// The user's stored refresh token, if any
    pub async fn active_session(&self, user_id: Uuid) -> Result<Option<RefreshToken>, AuthError> {
        Ok(self.repo.find_refresh_token_for_user(user_id).await?)
    }

    /// Change a password after re-checking the current one
    pub async fn update_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let credential = self
            .repo
            .find_credential(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .verify(old_password, credential.password_hash)
            .await
            .unwrap_or(false)
        {
            return Err(AuthError::InvalidCredentials);
        }

        validate_password_strength(new_password).map_err(AuthError::Validation)?;
        let new_hash = self.hash(new_password.to_string()).await?;
        self.repo.update_password_hash(user_id, &new_hash).await?;

        Ok(())
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub async fn get_roles(&self, user_id: Uuid) -> Result<UserRoles, AuthError> {
        let user = self.get_user(user_id).await?;
        let assignments = self.repo.list_role_assignments(user_id).await?;
        Ok(UserRoles::from_assignments(&user, &assignments))
    }

    /// Add a role; a primary addition demotes the current primary in the same transaction
    pub async fn add_role(
        &self,
        user_id: Uuid,
        role: RoleType,
        is_primary: bool,
    ) -> Result<UserRoles, AuthError> {
        self.repo.add_role(user_id, role, is_primary).await?;
        tracing::info!(user_id = %user_id, role = %role, is_primary, "Added role");
        self.get_roles(user_id).await
    }

    /// Remove a role; the oldest remaining role is promoted if the primary goes
    pub async fn remove_role(&self, user_id: Uuid, role: RoleType) -> Result<UserRoles, AuthError> {
        self.repo.remove_role(user_id, role).await?;
        tracing::info!(user_id = %user_id, role = %role, "Removed role");
        self.get_roles(user_id).await
    }

    pub async fn make_trusted_contact(&self, user_id: Uuid) -> Result<UserRoles, AuthError> {
        self.add_role(user_id, RoleType::TrustedContact, false).await
    }

    /// False for unknown users
    pub async fn has_role(&self, user_id: Uuid, role: RoleType) -> Result<bool, AuthError> {
        let assignments = self.repo.list_role_assignments(user_id).await?;
        Ok(assignments.iter().any(|a| a.role_type == role))
    }

    pub async fn has_both_roles(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let assignments = self.repo.list_role_assignments(user_id).await?;
        Ok(RoleType::ALL
            .iter()
            .all(|role| assignments.iter().any(|a| a.role_type == *role)))
    }

    // ========================================================================
    // Hashing
    // ========================================================================

    async fn hash(&self, password: String) -> Result<String, AuthError> {
        let config = self.password_config.clone();
        let hash =
            tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
                .await??;
        Ok(hash)
    }

    async fn verify(&self, password: &str, hash: String) -> Result<bool, AuthError> {
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??;
        Ok(matches)
    }
}

/// SHA-256 hex digest under which a refresh token is stored
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Usernames: no whitespace, no '@', no control characters
fn validate_username(username: &str) -> Result<(), String> {
    if username.contains('@') {
        return Err("Username must not contain '@'".to_string());
    }
    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("Username must not contain whitespace".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use paloma_core::MemoryAuthStore;

    const SECRET: &[u8] = b"service-test-secret-with-32-bytes-or-more";

    fn light_password_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn service_with_store() -> (AuthService, Arc<MemoryAuthStore>) {
        let store = Arc::new(MemoryAuthStore::new());
        let signer = Arc::new(TokenSigner::new(
            SECRET,
            "paloma-test",
            Duration::minutes(15),
            Duration::days(7),
        ));
        let service = AuthService::new(store.clone(), signer, light_password_config()).unwrap();
        (service, store)
    }

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            full_name: Some("Test User".to_string()),
            password: "Password123".to_string(),
            role_type: Some(RoleType::User),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (service, _) = service_with_store();
        let user = service
            .register(register_request("alice", "Alice@Example.com"))
            .await
            .unwrap();
        assert_eq!(user.email, "alice@example.com");

        let by_email = service.login("alice@example.com", "Password123").await.unwrap();
        assert_eq!(by_email.user.id, user.id);
        assert!(by_email.user.last_login.is_some());
        assert_eq!(
            service.signer().verify(&by_email.access_token.token).unwrap(),
            user.id
        );

        let by_username = service.login("alice", "Password123").await.unwrap();
        assert_eq!(by_username.user.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_leaves_no_partial_state() {
        let (service, store) = service_with_store();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = service
            .register(register_request("alice2", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.credential_count().await, 1);
        assert_eq!(store.role_count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (service, _) = service_with_store();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = service
            .register(register_request("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (service, store) = service_with_store();

        let mut weak = register_request("bob", "bob@example.com");
        weak.password = "password".to_string();
        assert!(matches!(
            service.register(weak).await,
            Err(AuthError::Validation(_))
        ));

        let at_sign = register_request("bob@home", "bob@example.com");
        assert!(matches!(
            service.register(at_sign).await,
            Err(AuthError::Validation(_))
        ));

        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_trusted_contact_registration_is_primary() {
        let (service, _) = service_with_store();
        let mut request = register_request("carer", "carer@example.com");
        request.role_type = Some(RoleType::TrustedContact);
        let user = service.register(request).await.unwrap();

        let roles = service.get_roles(user.id).await.unwrap();
        assert_eq!(roles.roles, vec![RoleType::TrustedContact]);
        assert_eq!(roles.primary_role, Some(RoleType::TrustedContact));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, _) = service_with_store();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let wrong_password = service.login("alice", "WrongPassword1").await.unwrap_err();
        let unknown_user = service.login("nobody", "Password123").await.unwrap_err();
        let unknown_email = service
            .login("nobody@example.com", "Password123")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(unknown_user.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_refresh_issues_access_token_without_rotation() {
        let (service, _) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        let tokens = service.login("alice", "Password123").await.unwrap();

        let (user_id, access) = service.refresh(&tokens.refresh_token.token).await.unwrap();
        assert_eq!(user_id, user.id);
        assert_eq!(service.signer().verify(&access.token).unwrap(), user.id);

        // Still usable: no rotation
        assert!(service.refresh(&tokens.refresh_token.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_unknown_and_access_tokens() {
        let (service, _) = service_with_store();
        service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        let tokens = service.login("alice", "Password123").await.unwrap();

        assert!(matches!(
            service.refresh("not-a-token").await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            service.refresh(&tokens.access_token.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_lazily_deleted() {
        let (service, store) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        // Issued eight days ago with a seven day lifetime
        let raw = "stale-refresh-token";
        let mut stale = RefreshToken::new(user.id, hash_token(raw), Duration::days(7));
        stale.created_at -= Duration::days(8);
        stale.expires_at -= Duration::days(8);
        store.insert_refresh_token(stale).await;

        assert!(matches!(service.refresh(raw).await, Err(AuthError::InvalidToken)));
        assert!(store
            .find_refresh_token(&hash_token(raw))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_at_expiry_instant_is_rejected() {
        let (service, store) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let raw = "boundary-token";
        let mut record = RefreshToken::new(user.id, hash_token(raw), Duration::days(7));
        record.expires_at = Utc::now();
        store.insert_refresh_token(record).await;

        assert!(matches!(service.refresh(raw).await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (service, _) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        let tokens = service.login("alice", "Password123").await.unwrap();

        assert_eq!(service.logout(user.id).await.unwrap(), 1);
        assert_eq!(service.logout(user.id).await.unwrap(), 0);
        assert!(matches!(
            service.refresh(&tokens.refresh_token.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_login_replaces_previous_refresh_token() {
        let (service, _) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let first = service.login("alice", "Password123").await.unwrap();
        let second = service.login("alice", "Password123").await.unwrap();

        assert!(matches!(
            service.refresh(&first.refresh_token.token).await,
            Err(AuthError::InvalidToken)
        ));
        assert!(service.refresh(&second.refresh_token.token).await.is_ok());
        let session = service.active_session(user.id).await.unwrap().unwrap();
        assert_eq!(session.token_hash, hash_token(&second.refresh_token.token));
    }

    #[tokio::test]
    async fn test_concurrent_logins_leave_one_refresh_token() {
        let (service, store) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let results = futures::future::join_all(
            (0..4).map(|_| service.login("alice", "Password123")),
        )
        .await;
        let tokens: Vec<LoginTokens> = results.into_iter().map(Result::unwrap).collect();

        let live: Vec<_> = {
            let mut live = Vec::new();
            for t in &tokens {
                if store
                    .find_refresh_token(&hash_token(&t.refresh_token.token))
                    .await
                    .unwrap()
                    .is_some()
                {
                    live.push(t);
                }
            }
            live
        };
        assert_eq!(live.len(), 1);
        assert!(service.active_session(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_password() {
        let (service, _) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = service
            .update_password(user.id, "WrongPassword1", "NewPassword456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        service
            .update_password(user.id, "Password123", "NewPassword456")
            .await
            .unwrap();
        assert!(service.login("alice", "Password123").await.is_err());
        assert!(service.login("alice", "NewPassword456").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_email_and_username() {
        let (service, _) = service_with_store();
        let alice = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        service
            .register(register_request("bob", "bob@example.com"))
            .await
            .unwrap();

        let updated = service
            .update_email(alice.id, "ALICE@new.example.com")
            .await
            .unwrap();
        assert_eq!(updated.email, "alice@new.example.com");
        assert!(matches!(
            service.update_email(alice.id, "bob@example.com").await,
            Err(AuthError::DuplicateEmail)
        ));

        let renamed = service.update_username(alice.id, "alicia").await.unwrap();
        assert_eq!(renamed.username, "alicia");
        assert!(matches!(
            service.update_username(alice.id, "bob").await,
            Err(AuthError::DuplicateUsername)
        ));
        assert!(service.login("alicia", "Password123").await.is_ok());
    }

    #[tokio::test]
    async fn test_role_scenario() {
        let (service, _) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        service.login("alice", "Password123").await.unwrap();

        service
            .add_role(user.id, RoleType::TrustedContact, false)
            .await
            .unwrap();
        let roles = service.get_roles(user.id).await.unwrap();
        assert_eq!(roles.roles, vec![RoleType::User, RoleType::TrustedContact]);
        assert_eq!(roles.primary_role, Some(RoleType::User));
        assert!(service.has_both_roles(user.id).await.unwrap());

        let roles = service.remove_role(user.id, RoleType::User).await.unwrap();
        assert_eq!(roles.primary_role, Some(RoleType::TrustedContact));
        assert!(!service.has_role(user.id, RoleType::User).await.unwrap());

        assert!(matches!(
            service.remove_role(user.id, RoleType::TrustedContact).await,
            Err(AuthError::LastRole)
        ));
        assert!(matches!(
            service.remove_role(user.id, RoleType::User).await,
            Err(AuthError::RoleNotFound(RoleType::User))
        ));
    }

    #[tokio::test]
    async fn test_primary_addition_swaps_primary() {
        let (service, _) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();

        let roles = service
            .add_role(user.id, RoleType::TrustedContact, true)
            .await
            .unwrap();
        assert_eq!(roles.primary_role, Some(RoleType::TrustedContact));
        assert!(matches!(
            service.add_role(user.id, RoleType::User, false).await,
            Err(AuthError::DuplicateRole(RoleType::User))
        ));
    }

    #[tokio::test]
    async fn test_role_operations_on_unknown_user() {
        let (service, _) = service_with_store();
        let missing = Uuid::new_v4();

        assert!(matches!(
            service.make_trusted_contact(missing).await,
            Err(AuthError::UserNotFound(id)) if id == missing
        ));
        assert!(matches!(
            service.get_roles(missing).await,
            Err(AuthError::UserNotFound(_))
        ));
        assert!(!service.has_role(missing, RoleType::User).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let (service, store) = service_with_store();
        let user = service
            .register(register_request("alice", "alice@example.com"))
            .await
            .unwrap();
        service.login("alice", "Password123").await.unwrap();

        service.delete_user(user.id).await.unwrap();
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.credential_count().await, 0);
        assert_eq!(store.role_count().await, 0);
        assert!(service.active_session(user.id).await.unwrap().is_none());
        assert!(matches!(
            service.delete_user(user.id).await,
            Err(AuthError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_token("abc"));
        assert_ne!(digest, hash_token("abd"));
    }
}
