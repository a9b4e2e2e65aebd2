//! Authors repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::author::{Author, AuthorChoice, AuthorFields},
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get author by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    pub async fn exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM authors WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// One page of authors, ordered by last then first name
    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            "SELECT * FROM authors ORDER BY last_name, first_name, id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    /// Every author as a select option
    pub async fn choices(&self) -> AppResult<Vec<AuthorChoice>> {
        let choices = sqlx::query_as::<_, AuthorChoice>(
            r#"
            SELECT id, last_name || ', ' || first_name AS name
            FROM authors
            ORDER BY last_name, first_name, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(choices)
    }

    pub async fn create(&self, fields: &AuthorFields) -> AppResult<Author> {
        let author = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (first_name, last_name, date_of_birth, date_of_death)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.date_of_birth)
        .bind(fields.date_of_death)
        .fetch_one(&self.pool)
        .await?;
        Ok(author)
    }

    pub async fn update(&self, id: i32, fields: &AuthorFields) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors
            SET first_name = $1, last_name = $2, date_of_birth = $3, date_of_death = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(fields.date_of_birth)
        .bind(fields.date_of_death)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Delete an author; their books keep existing without an author
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }
        Ok(())
    }
}
