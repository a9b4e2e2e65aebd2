//! Users repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::User,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Permission codenames granted to a user, qualified as `catalog.<codename>`
    pub async fn permissions(&self, user_id: i32) -> AppResult<Vec<String>> {
        let permissions: Vec<String> = sqlx::query_scalar(
            "SELECT 'catalog.' || codename FROM user_permissions WHERE user_id = $1 ORDER BY codename",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    pub async fn create_superuser(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, is_superuser)
            VALUES ($1, $2, TRUE)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("User {} already exists", username))
            }
            _ => AppError::Database(e),
        })?;
        Ok(user)
    }
}
