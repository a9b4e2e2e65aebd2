//! Books repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookFields, BookShort},
        genre::Genre,
    },
};

/// Shared projection for `BookShort`
const BOOK_SHORT_SELECT: &str = r#"
    SELECT b.id, b.title, b.author_id,
           CASE WHEN a.id IS NULL THEN NULL
                ELSE a.last_name || ', ' || a.first_name END AS author_name
    FROM books b
    LEFT JOIN authors a ON a.id = b.author_id
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// One page of books ordered by title
    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<BookShort>> {
        let query = format!("{} ORDER BY b.title, b.id LIMIT $1 OFFSET $2", BOOK_SHORT_SELECT);
        let books = sqlx::query_as::<_, BookShort>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Books written by an author
    pub async fn list_by_author(&self, author_id: i32) -> AppResult<Vec<BookShort>> {
        let query = format!("{} WHERE b.author_id = $1 ORDER BY b.title, b.id", BOOK_SHORT_SELECT);
        let books = sqlx::query_as::<_, BookShort>(&query)
            .bind(author_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Genres attached to a book
    pub async fn genres(&self, book_id: i32) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>(
            r#"
            SELECT g.id, g.name
            FROM genres g
            JOIN book_genres bg ON bg.genre_id = g.id
            WHERE bg.book_id = $1
            ORDER BY g.name
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    /// Insert a book and its genre links in one transaction
    pub async fn create(&self, fields: &BookFields) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author_id, summary, isbn, language_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(fields.author_id)
        .bind(&fields.summary)
        .bind(&fields.isbn)
        .bind(fields.language_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO book_genres (book_id, genre_id) SELECT $1, UNNEST($2::int[])",
        )
        .bind(book.id)
        .bind(&fields.genre_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }

    /// Overwrite a book and replace its genre links
    pub async fn update(&self, id: i32, fields: &BookFields) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $1, author_id = $2, summary = $3, isbn = $4, language_id = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(fields.author_id)
        .bind(&fields.summary)
        .bind(&fields.isbn)
        .bind(fields.language_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        sqlx::query("DELETE FROM book_genres WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO book_genres (book_id, genre_id) SELECT $1, UNNEST($2::int[])",
        )
        .bind(id)
        .bind(&fields.genre_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }

    /// Delete a book; refused while copies still reference it
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::protected(e, format!("Book with id {} still has copies", id))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
