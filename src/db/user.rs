use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::new_id;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Public view of a user. Never carries the password hash or refresh token.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Secret fields needed for login and token rotation.
#[derive(Clone, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("id", &self.id)
            .field("password_hash", &"[HASH]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[TOKEN]"))
            .finish()
    }
}

/// Owner projection embedded in videos, comments, subscriptions and the like.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: String,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub avatar: &'a str,
    pub cover_image: &'a str,
    pub password_hash: &'a str,
}

const PUBLIC_COLUMNS: &str =
    "id, username, email, full_name, avatar, cover_image, created_at, updated_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. Returns the new user id.
    /// Fails with a unique-constraint error if the username or email is taken.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<String, sqlx::Error> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user.username)
        .bind(user.email)
        .bind(user.full_name)
        .bind(user.avatar)
        .bind(user.cover_image)
        .bind(user.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Check whether a username or email is already registered.
    pub async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", PUBLIC_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM users WHERE username = ?", PUBLIC_COLUMNS))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a user by email.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", PUBLIC_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get the secret fields for a user by ID.
    pub async fn get_credentials(&self, id: &str) -> Result<Option<UserCredentials>, sqlx::Error> {
        sqlx::query_as("SELECT id, password_hash, refresh_token FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Replace the stored refresh token. Returns false if the user does not exist.
    pub async fn set_refresh_token(&self, id: &str, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the stored refresh token, invalidating the refresh chain.
    pub async fn clear_refresh_token(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set a new password hash. Also drops the refresh token so other sessions must log in again.
    pub async fn set_password_hash(&self, id: &str, hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, refresh_token = NULL, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_details(
        &self,
        id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET full_name = ?, email = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(full_name)
        .bind(email)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_avatar(&self, id: &str, url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET avatar = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_cover_image(&self, id: &str, url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET cover_image = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
