//! Paloma Core - Domain models, role rules, and storage
//!
//! This crate defines the core abstractions used by the Paloma services:
//! - Identity models (users, credentials, role assignments, refresh tokens)
//! - Role assignment rules (at most one assignment per role, exactly one primary)
//! - Configuration management
//! - Repository trait with PostgreSQL and in-memory implementations
//!
//! Author: hephaex@gmail.com

pub mod config;
pub mod memory;
pub mod postgres;
pub mod roles;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, PasswordHashConfig};
pub use memory::MemoryAuthStore;
pub use postgres::PgAuthStore;
pub use roles::RoleRuleError;
pub use store::{AuthRepository, RepositoryError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Roles
// ============================================================================

/// Role a user can hold
///
/// - `User`: the default role of a person tracking their own data
/// - `TrustedContact`: someone another user has chosen to share data with
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleType {
    User,
    TrustedContact,
}

impl RoleType {
    /// Every role type, in declaration order
    pub const ALL: [RoleType; 2] = [RoleType::User, RoleType::TrustedContact];

    /// Storage and wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::User => "USER",
            RoleType::TrustedContact => "TRUSTED_CONTACT",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = UnknownRoleType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "USER" => Ok(RoleType::User),
            "TRUSTED_CONTACT" => Ok(RoleType::TrustedContact),
            _ => Err(UnknownRoleType(s.to_string())),
        }
    }
}

/// Returned when a role name does not match any [`RoleType`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role type: {0}")]
pub struct UnknownRoleType(pub String);

// ============================================================================
// Identity records
// ============================================================================

/// User account
///
/// Credentials, role assignments, and refresh tokens reference a user by `id`
/// and are looked up through the repository; the user holds no back-references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create a user record with a fresh id
    pub fn new(username: impl Into<String>, email: impl Into<String>, full_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            full_name,
            created_at: Utc::now(),
            last_login: None,
        }
    }
}

/// Password hash record, 1:1 with a user
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user_id: Uuid,
    /// PHC-formatted Argon2id hash
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(user_id: Uuid, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Link between a user and a role type
///
/// `seq` is assigned by the store and increases with every insert. It is the
/// tie-break used when a new primary has to be picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role_type: RoleType,
    pub is_primary: bool,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

/// Server-side record of a user's refresh token
///
/// Only the SHA-256 digest of the token handed to the client is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: Uuid, token_hash: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            token_hash: token_hash.into(),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    /// A token is live strictly before its expiry instant
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Everything written by a registration, committed as one unit
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user: User,
    pub credential: Credential,
    pub role_type: RoleType,
    pub is_primary: bool,
}

/// A user's role set as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserRoles {
    pub user_id: Uuid,
    pub username: String,
    /// Roles in assignment order
    pub roles: Vec<RoleType>,
    pub primary_role: Option<RoleType>,
}

impl UserRoles {
    pub fn from_assignments(user: &User, assignments: &[RoleAssignment]) -> Self {
        let mut ordered: Vec<&RoleAssignment> = assignments.iter().collect();
        ordered.sort_by_key(|a| a.seq);

        Self {
            user_id: user.id,
            username: user.username.clone(),
            roles: ordered.iter().map(|a| a.role_type).collect(),
            primary_role: ordered.iter().find(|a| a.is_primary).map(|a| a.role_type),
        }
    }

    pub fn has_role(&self, role: RoleType) -> bool {
        self.roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_type_parse_and_display() {
        assert_eq!("USER".parse::<RoleType>().unwrap(), RoleType::User);
        assert_eq!(
            "trusted_contact".parse::<RoleType>().unwrap(),
            RoleType::TrustedContact
        );
        assert_eq!(
            "trusted-contact".parse::<RoleType>().unwrap(),
            RoleType::TrustedContact
        );
        assert!("ADMIN".parse::<RoleType>().is_err());
        assert_eq!(RoleType::TrustedContact.to_string(), "TRUSTED_CONTACT");
    }

    #[test]
    fn test_role_type_serde() {
        let json = serde_json::to_string(&RoleType::TrustedContact).unwrap();
        assert_eq!(json, "\"TRUSTED_CONTACT\"");
        let back: RoleType = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(back, RoleType::User);
    }

    #[test]
    fn test_refresh_token_expiry_boundary() {
        let token = RefreshToken::new(Uuid::new_v4(), "digest", Duration::days(7));
        let expiry = token.expires_at;

        assert!(token.is_live_at(expiry - Duration::milliseconds(1)));
        // expiry == now counts as expired
        assert!(!token.is_live_at(expiry));
        assert!(!token.is_live_at(expiry + Duration::seconds(1)));
    }

    #[test]
    fn test_user_roles_ordered_by_seq() {
        let user = User::new("alice", "alice@example.com", None);
        let now = Utc::now();
        let assignments = vec![
            RoleAssignment {
                user_id: user.id,
                role_type: RoleType::TrustedContact,
                is_primary: false,
                seq: 7,
                created_at: now,
            },
            RoleAssignment {
                user_id: user.id,
                role_type: RoleType::User,
                is_primary: true,
                seq: 3,
                created_at: now,
            },
        ];

        let roles = UserRoles::from_assignments(&user, &assignments);
        assert_eq!(roles.roles, vec![RoleType::User, RoleType::TrustedContact]);
        assert_eq!(roles.primary_role, Some(RoleType::User));
        assert!(roles.has_role(RoleType::TrustedContact));
    }

    #[test]
    fn test_credential_debug_hides_hash() {
        let credential = Credential::new(Uuid::new_v4(), "$argon2id$v=19$secret");
        assert!(!format!("{credential:?}").contains("secret"));
    }
}
