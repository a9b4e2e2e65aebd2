//! Book instances (copies) repository

use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book_instance::{BookInstance, BorrowedCopyRow, LoanStatus},
};

/// Shared projection for `BorrowedCopyRow`
const BORROWED_SELECT: &str = r#"
    SELECT bi.id, bi.book_id, b.title AS book_title, bi.imprint, bi.due_back,
           bi.borrower_id, u.username AS borrower_username
    FROM book_instances bi
    LEFT JOIN books b ON b.id = bi.book_id
    LEFT JOIN users u ON u.id = bi.borrower_id
"#;

#[derive(Clone)]
pub struct BookInstancesRepository {
    pool: Pool<Postgres>,
}

impl BookInstancesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Copy joined with its book and borrower
    pub async fn get_details(&self, id: Uuid) -> AppResult<BorrowedCopyRow> {
        let query = format!("{} WHERE bi.id = $1", BORROWED_SELECT);
        sqlx::query_as::<_, BorrowedCopyRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book instance {} not found", id)))
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_by_status(&self, status: LoanStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Copies of a book, ordered by due date
    pub async fn list_by_book(&self, book_id: i32) -> AppResult<Vec<BookInstance>> {
        let copies = sqlx::query_as::<_, BookInstance>(
            "SELECT * FROM book_instances WHERE book_id = $1 ORDER BY due_back NULLS LAST, id",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(copies)
    }

    /// Count copies on loan, optionally restricted to one borrower
    pub async fn count_on_loan(&self, borrower_id: Option<i32>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM book_instances
            WHERE status = $1 AND ($2::int IS NULL OR borrower_id = $2)
            "#,
        )
        .bind(LoanStatus::OnLoan)
        .bind(borrower_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// One page of copies on loan, soonest due first
    pub async fn list_on_loan(
        &self,
        borrower_id: Option<i32>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<BorrowedCopyRow>> {
        let query = format!(
            r#"{}
            WHERE bi.status = $1 AND ($2::int IS NULL OR bi.borrower_id = $2)
            ORDER BY bi.due_back, bi.id
            LIMIT $3 OFFSET $4"#,
            BORROWED_SELECT
        );

        let rows = sqlx::query_as::<_, BorrowedCopyRow>(&query)
            .bind(LoanStatus::OnLoan)
            .bind(borrower_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Set a new due date; status and borrower are left as they are
    pub async fn set_due_back(&self, id: Uuid, due_back: NaiveDate) -> AppResult<BookInstance> {
        sqlx::query_as::<_, BookInstance>(
            "UPDATE book_instances SET due_back = $1 WHERE id = $2 RETURNING *",
        )
        .bind(due_back)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book instance {} not found", id)))
    }
}
