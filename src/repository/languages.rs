//! Languages repository

use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::language::Language};

#[derive(Clone)]
pub struct LanguagesRepository {
    pool: Pool<Postgres>,
}

impl LanguagesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Language>> {
        let languages = sqlx::query_as::<_, Language>("SELECT * FROM languages ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(languages)
    }

    pub async fn get(&self, id: i32) -> AppResult<Option<Language>> {
        let language = sqlx::query_as::<_, Language>("SELECT * FROM languages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(language)
    }
}
