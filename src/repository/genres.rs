//! Genres repository

use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::genre::Genre};

#[derive(Clone)]
pub struct GenresRepository {
    pool: Pool<Postgres>,
}

impl GenresRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT * FROM genres ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(genres)
    }

    /// Genres whose name contains `fragment` (case-sensitive)
    pub async fn name_contains(&self, fragment: &str) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            r#"
            SELECT * FROM genres
            WHERE strpos(name, $1) > 0
            ORDER BY name
            "#,
        )
        .bind(fragment)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    /// Which of `ids` exist
    pub async fn existing_ids(&self, ids: &[i32]) -> AppResult<Vec<i32>> {
        let found: Vec<i32> = sqlx::query_scalar("SELECT id FROM genres WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(found)
    }
}
