//! PostgreSQL repository
//!
//! Multi-record operations run inside an explicit transaction; dropping the
//! transaction without `commit` rolls everything back. Role changes lock the
//! owning user row first so that concurrent changes for one user serialize.
//!
//! Author: hephaex@gmail.com

use crate::roles::{plan_addition, plan_removal};
use crate::store::{AuthRepository, RepositoryError, Result};
use crate::{Credential, NewAccount, RefreshToken, RoleAssignment, RoleType, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

/// Idempotent bootstrap schema
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          UUID PRIMARY KEY,
    username    VARCHAR(100) NOT NULL,
    email       VARCHAR(200) NOT NULL,
    full_name   VARCHAR(100),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_login  TIMESTAMPTZ,
    CONSTRAINT users_username_key UNIQUE (username),
    CONSTRAINT users_email_key UNIQUE (email)
);

CREATE TABLE IF NOT EXISTS credentials (
    user_id        UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    password_hash  TEXT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS role_assignments (
    user_id     UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_type   VARCHAR(32) NOT NULL,
    is_primary  BOOLEAN NOT NULL DEFAULT FALSE,
    seq         BIGINT GENERATED ALWAYS AS IDENTITY,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT role_assignments_user_role_key PRIMARY KEY (user_id, role_type)
);

CREATE UNIQUE INDEX IF NOT EXISTS role_assignments_one_primary
    ON role_assignments (user_id) WHERE is_primary;

CREATE TABLE IF NOT EXISTS refresh_tokens (
    user_id     UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    token_hash  CHAR(64) NOT NULL,
    expires_at  TIMESTAMPTZ NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT refresh_tokens_token_hash_key UNIQUE (token_hash)
);
"#;

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    /// Connect to PostgreSQL
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Apply the bootstrap schema
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    /// Lock the user row and read its role assignments, oldest first
    async fn lock_assignments(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<Vec<RoleAssignment>> {
        let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        if locked.is_none() {
            return Err(RepositoryError::UserNotFound(user_id));
        }

        let rows: Vec<RoleRow> = sqlx::query_as(
            r#"
            SELECT user_id, role_type, is_primary, seq, created_at
            FROM role_assignments
            WHERE user_id = $1
            ORDER BY seq
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(RoleAssignment::try_from).collect()
    }

    async fn insert_assignment(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        role: RoleType,
        is_primary: bool,
        created_at: DateTime<Utc>,
    ) -> Result<RoleAssignment> {
        let row: RoleRow = sqlx::query_as(
            r#"
            INSERT INTO role_assignments (user_id, role_type, is_primary, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, role_type, is_primary, seq, created_at
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .bind(is_primary)
        .bind(created_at)
        .fetch_one(&mut **tx)
        .await?;

        row.try_into()
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    full_name: Option<String>,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            created_at: row.created_at,
            last_login: row.last_login,
        }
    }
}

#[derive(FromRow)]
struct CredentialRow {
    user_id: Uuid,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CredentialRow> for Credential {
    fn from(row: CredentialRow) -> Self {
        Self {
            user_id: row.user_id,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    user_id: Uuid,
    role_type: String,
    is_primary: bool,
    seq: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for RoleAssignment {
    type Error = RepositoryError;

    fn try_from(row: RoleRow) -> Result<Self> {
        let role_type = row
            .role_type
            .parse()
            .map_err(|e: crate::UnknownRoleType| RepositoryError::Corrupt(e.to_string()))?;

        Ok(Self {
            user_id: row.user_id,
            role_type,
            is_primary: row.is_primary,
            seq: row.seq,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

/// Translate unique-constraint violations on `users` into domain errors
fn map_user_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            match db.constraint() {
                Some("users_email_key") => return RepositoryError::DuplicateEmail,
                Some("users_username_key") => return RepositoryError::DuplicateUsername,
                _ => {}
            }
        }
    }
    RepositoryError::Database(err)
}

const USER_COLUMNS: &str = "id, username, email, full_name, created_at, last_login";

#[async_trait]
impl AuthRepository for PgAuthStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(User::from))
    }

    async fn create_account(&self, account: &NewAccount) -> Result<RoleAssignment> {
        let plan = plan_addition(&[], account.role_type, account.is_primary)?;
        let user = &account.user;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, full_name, created_at, last_login)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.created_at)
        .bind(user.last_login)
        .execute(&mut *tx)
        .await
        .map_err(map_user_write_error)?;

        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(&account.credential.password_hash)
        .bind(account.credential.created_at)
        .bind(account.credential.updated_at)
        .execute(&mut *tx)
        .await?;

        let assignment = Self::insert_assignment(
            &mut tx,
            user.id,
            account.role_type,
            plan.is_primary,
            user.created_at,
        )
        .await?;

        tx.commit().await?;
        Ok(assignment)
    }

    async fn update_email(&self, user_id: Uuid, email: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET email = $2 WHERE id = $1")
            .bind(user_id)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(map_user_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn update_username(&self, user_id: Uuid, username: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET username = $2 WHERE id = $1")
            .bind(user_id)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(map_user_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        // Credentials, role assignments and refresh tokens go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_credential(&self, user_id: Uuid) -> Result<Option<Credential>> {
        let row: Option<CredentialRow> = sqlx::query_as(
            "SELECT user_id, password_hash, created_at, updated_at FROM credentials WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Credential::from))
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE credentials SET password_hash = $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn record_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
        token: &RefreshToken,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound(user_id));
        }

        // Single statement keyed by user id: concurrent logins leave the last writer's row
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT user_id, token_hash, expires_at, created_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshToken::from))
    }

    async fn find_refresh_token_for_user(&self, user_id: Uuid) -> Result<Option<RefreshToken>> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            "SELECT user_id, token_hash, expires_at, created_at FROM refresh_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshToken::from))
    }

    async fn delete_refresh_token(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_role_assignments(&self, user_id: Uuid) -> Result<Vec<RoleAssignment>> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            r#"
            SELECT user_id, role_type, is_primary, seq, created_at
            FROM role_assignments
            WHERE user_id = $1
            ORDER BY seq
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RoleAssignment::try_from).collect()
    }

    async fn add_role(
        &self,
        user_id: Uuid,
        role: RoleType,
        requested_primary: bool,
    ) -> Result<RoleAssignment> {
        let mut tx = self.pool.begin().await?;
        let existing = Self::lock_assignments(&mut tx, user_id).await?;
        let plan = plan_addition(&existing, role, requested_primary)?;

        // Demote before inserting: the partial unique index allows one primary per user
        if plan.demote_existing {
            sqlx::query("UPDATE role_assignments SET is_primary = FALSE WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let assignment =
            Self::insert_assignment(&mut tx, user_id, role, plan.is_primary, Utc::now()).await?;

        tx.commit().await?;
        Ok(assignment)
    }

    async fn remove_role(&self, user_id: Uuid, role: RoleType) -> Result<Vec<RoleAssignment>> {
        let mut tx = self.pool.begin().await?;
        let existing = Self::lock_assignments(&mut tx, user_id).await?;
        let plan = plan_removal(&existing, role)?;

        sqlx::query("DELETE FROM role_assignments WHERE user_id = $1 AND role_type = $2")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;

        if let Some(promote) = plan.promote {
            sqlx::query(
                "UPDATE role_assignments SET is_primary = TRUE WHERE user_id = $1 AND role_type = $2",
            )
            .bind(user_id)
            .bind(promote.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let remaining = Self::lock_assignments(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(remaining)
    }
}
