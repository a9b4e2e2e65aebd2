//! Book instance (physical copy) model and loan status

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;

/// Availability of a physical copy, stored as a one-letter code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LoanStatus {
    #[serde(rename = "m")]
    Maintenance,
    #[serde(rename = "o")]
    OnLoan,
    #[serde(rename = "a")]
    Available,
    #[serde(rename = "r")]
    Reserved,
}

impl LoanStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "m",
            LoanStatus::OnLoan => "o",
            LoanStatus::Available => "a",
            LoanStatus::Reserved => "r",
        }
    }
}

impl Default for LoanStatus {
    fn default() -> Self {
        LoanStatus::Maintenance
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "m" => Ok(LoanStatus::Maintenance),
            "o" => Ok(LoanStatus::OnLoan),
            "a" => Ok(LoanStatus::Available),
            "r" => Ok(LoanStatus::Reserved),
            _ => Err(format!("Invalid loan status code: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_code(), buf)
    }
}

/// Physical copy of a book
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookInstance {
    pub id: Uuid,
    pub book_id: Option<i32>,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub borrower_id: Option<i32>,
    pub status: LoanStatus,
}

/// Row shape for borrowed-copy listings
#[derive(Debug, Clone, FromRow)]
pub struct BorrowedCopyRow {
    pub id: Uuid,
    pub book_id: Option<i32>,
    pub book_title: Option<String>,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub borrower_id: Option<i32>,
    pub borrower_username: Option<String>,
}

/// Copy currently on loan, with book and borrower resolved
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowedCopy {
    pub id: Uuid,
    pub book_id: Option<i32>,
    pub book_title: Option<String>,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub borrower_id: Option<i32>,
    pub borrower_username: Option<String>,
    pub is_overdue: bool,
}

impl BorrowedCopy {
    pub fn from_row(row: BorrowedCopyRow, today: NaiveDate) -> Self {
        let is_overdue = row.due_back.map(|d| d < today).unwrap_or(false);
        Self {
            id: row.id,
            book_id: row.book_id,
            book_title: row.book_title,
            imprint: row.imprint,
            due_back: row.due_back,
            borrower_id: row.borrower_id,
            borrower_username: row.borrower_username,
            is_overdue,
        }
    }
}
