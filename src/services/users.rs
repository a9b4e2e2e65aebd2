//! Authentication service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::{AuthConfig, BootstrapAdmin},
    error::{AppError, AppResult},
    models::user::{User, UserClaims},
    repository::Repository,
};

/// Issued bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate user by username and password and return a JWT token
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<(IssuedToken, User)> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !user.is_active {
            tracing::warn!(username, "Login attempt on inactive account");
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        if !self.verify_password(&user, password)? {
            tracing::warn!(username, "Login failed");
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let token = self.create_token_for_user(&user).await?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok((token, user))
    }

    async fn create_token_for_user(&self, user: &User) -> AppResult<IssuedToken> {
        let permissions = self.repository.users.permissions(user.id).await?;

        let now = Utc::now().timestamp();
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            is_superuser: user.is_superuser,
            permissions,
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(IssuedToken { token, expires_in })
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Current user and their qualified permissions
    pub async fn me(&self, user_id: i32) -> AppResult<(User, Vec<String>)> {
        let user = self.repository.users.get_by_id(user_id).await?;
        let permissions = self.repository.users.permissions(user_id).await?;
        Ok((user, permissions))
    }

    /// Create the configured superuser unless that username is taken
    pub async fn ensure_superuser(&self, admin: &BootstrapAdmin) -> AppResult<()> {
        if self
            .repository
            .users
            .get_by_username(&admin.username)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let hash = self.hash_password(&admin.password)?;
        let user = self
            .repository
            .users
            .create_superuser(&admin.username, &hash)
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "Created bootstrap superuser");
        Ok(())
    }
}
