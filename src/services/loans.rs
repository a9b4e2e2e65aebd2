//! Loan views and renewal

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::book_instance::{BookInstance, BorrowedCopy},
    pagination::{ListContext, Paginator},
    repository::Repository,
};

pub const BORROWED_PER_PAGE: i64 = 10;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Copies on loan, soonest due first; every borrower when `borrower_id` is `None`
    pub async fn list_borrowed(
        &self,
        borrower_id: Option<i32>,
        page: Option<&str>,
        today: NaiveDate,
    ) -> AppResult<ListContext<BorrowedCopy>> {
        let count = self.repository.book_instances.count_on_loan(borrower_id).await?;
        let page_obj = Paginator::new(count, BORROWED_PER_PAGE).page(page)?;

        let rows = self
            .repository
            .book_instances
            .list_on_loan(borrower_id, page_obj.per_page, page_obj.offset)
            .await?;

        let copies = rows
            .into_iter()
            .map(|row| BorrowedCopy::from_row(row, today))
            .collect();

        Ok(ListContext::new(copies, page_obj))
    }

    /// Copy with its book title and borrower resolved
    pub async fn instance_details(&self, id: Uuid, today: NaiveDate) -> AppResult<BorrowedCopy> {
        let row = self.repository.book_instances.get_details(id).await?;
        Ok(BorrowedCopy::from_row(row, today))
    }

    /// Move the due date of a copy
    pub async fn renew(&self, id: Uuid, due_back: NaiveDate) -> AppResult<BookInstance> {
        let instance = self.repository.book_instances.set_due_back(id, due_back).await?;
        tracing::info!(instance_id = %id, %due_back, "Book instance renewed");
        Ok(instance)
    }
}
