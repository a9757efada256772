//! # User & Role Repositories
//!
//! User CRUD plus credential verification. Passwords are hashed with
//! argon2 (PHC string format) at creation and verified on login; the
//! plaintext never touches the database. Login attempts - successful or
//! not - leave an audit trail.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::audit::AuditLogRepository;
use quadtech_core::validation::{validate_name, validate_password, validate_username};
use quadtech_core::{NewUser, Role, User};

const USER_COLUMNS: &str = "u.id, u.role_id, u.username, u.email, u.password_hash, u.full_name, \
     u.is_active, u.last_login, u.created_at, u.updated_at, r.name AS role_name";

const USER_JOIN: &str = "FROM users u INNER JOIN roles r ON u.role_id = r.id";

// =============================================================================
// Roles
// =============================================================================

/// Repository for role lookups. Roles are seeded by migration.
#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: SqlitePool,
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RoleRepository { pool }
    }

    /// Lists all roles.
    pub async fn list(&self) -> DbResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    /// Gets a role by name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at FROM roles WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }
}

// =============================================================================
// Users
// =============================================================================

/// Repository for user operations and authentication.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Lists all users with their role names.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} {USER_JOIN} ORDER BY u.username");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Gets a user by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} {USER_JOIN} WHERE u.id = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Gets a user by username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} {USER_JOIN} WHERE u.username = ?1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Creates a user, hashing the password.
    pub async fn create(&self, input: &NewUser) -> DbResult<User> {
        validate_username(&input.username)?;
        validate_password(&input.password)?;
        validate_name("full name", &input.full_name)?;
        debug!(username = %input.username, "Creating user");

        let password_hash = hash_password(&input.password)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (role_id, username, email, password_hash, full_name, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        )
        .bind(input.role_id)
        .bind(input.username.trim())
        .bind(&input.email)
        .bind(&password_hash)
        .bind(input.full_name.trim())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Updates a user's profile (not the password).
    pub async fn update_profile(
        &self,
        id: i64,
        role_id: i64,
        email: Option<&str>,
        full_name: &str,
    ) -> DbResult<()> {
        validate_name("full name", full_name)?;

        let result = sqlx::query(
            "UPDATE users SET role_id = ?2, email = ?3, full_name = ?4, updated_at = ?5
             WHERE id = ?1",
        )
        .bind(id)
        .bind(role_id)
        .bind(email)
        .bind(full_name.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Replaces a user's password.
    pub async fn set_password(&self, id: i64, password: &str) -> DbResult<()> {
        validate_password(password)?;

        let password_hash = hash_password(password)?;
        let result =
            sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(password_hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Deactivates a user. Deactivated users cannot log in.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Verifies a login attempt.
    ///
    /// Returns the user on success, `None` on unknown username, wrong
    /// password, or an inactive account. Known-user outcomes are audited
    /// as `login` / `login_failed`.
    pub async fn verify_login(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let Some(user) = self.get_by_username(username).await? else {
            debug!(username = %username, "Login attempt for unknown username");
            return Ok(None);
        };

        let audit = AuditLogRepository::new(self.pool.clone());

        if !user.is_active {
            warn!(username = %username, "Login attempt for inactive account");
            audit
                .record(
                    user.id,
                    "login_failed",
                    Some("users"),
                    Some(user.id),
                    None,
                    Some(&json!({ "username": username, "reason": "account inactive" })),
                    Some(&format!("login failed: {username}")),
                )
                .await;
            return Ok(None);
        }

        if !verify_password(password, &user.password_hash) {
            audit
                .record(
                    user.id,
                    "login_failed",
                    Some("users"),
                    Some(user.id),
                    None,
                    Some(&json!({ "username": username, "reason": "invalid password" })),
                    Some(&format!("login failed: {username}")),
                )
                .await;
            return Ok(None);
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ?2 WHERE id = ?1")
            .bind(user.id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        info!(username = %username, "User logged in");
        audit
            .record(
                user.id,
                "login",
                Some("users"),
                Some(user.id),
                None,
                None,
                Some(&format!("logged in: {username}")),
            )
            .await;

        Ok(Some(User {
            last_login: Some(now),
            ..user
        }))
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password into PHC string format.
fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::pool::Database;

    /// Creates a staff user for use in other repository tests.
    pub async fn create_test_user(db: &Database, username: &str) -> User {
        let role = db.roles().get_by_name("staff").await.unwrap().unwrap();
        db.users()
            .create(&NewUser {
                role_id: role.id,
                username: username.to_string(),
                email: None,
                full_name: format!("Test {username}"),
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_user_hashes_password() {
        let db = Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "alice").await;

        assert_ne!(user.password_hash, "correct-horse");
        assert!(user.password_hash.starts_with("$argon2"));
        assert_eq!(user.role_name.as_deref(), Some("staff"));
    }

    #[tokio::test]
    async fn test_login_success_updates_last_login_and_audits() {
        let db = Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        create_test_user(&db, "bob").await;

        let user = db
            .users()
            .verify_login("bob", "correct-horse")
            .await
            .unwrap()
            .expect("login should succeed");
        assert!(user.last_login.is_some());

        let trail = db.audit_log().by_user(user.id, 10).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "login");
    }

    #[tokio::test]
    async fn test_login_wrong_password_audited() {
        let db = Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "carol").await;

        let result = db.users().verify_login("carol", "wrong").await.unwrap();
        assert!(result.is_none());

        let trail = db.audit_log().by_user(user.id, 10).await.unwrap();
        assert_eq!(trail[0].action, "login_failed");
    }

    #[tokio::test]
    async fn test_login_inactive_account_rejected() {
        let db = Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "dave").await;
        db.users().deactivate(user.id).await.unwrap();

        let result = db
            .users()
            .verify_login("dave", "correct-horse")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_username_no_audit() {
        let db = Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        let result = db.users().verify_login("nobody", "whatever").await.unwrap();
        assert!(result.is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_set_password() {
        let db = Database::new(crate::pool::DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "erin").await;

        db.users().set_password(user.id, "new-password-1").await.unwrap();
        assert!(db
            .users()
            .verify_login("erin", "correct-horse")
            .await
            .unwrap()
            .is_none());
        assert!(db
            .users()
            .verify_login("erin", "new-password-1")
            .await
            .unwrap()
            .is_some());
    }
}
