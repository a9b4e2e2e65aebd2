//! Author model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::BookShort;

/// Full author model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl Author {
    /// Display name, "last, first"
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// Author with the books attributed to them
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorDetail {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<BookShort>,
}

/// Cleaned author fields, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorFields {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

/// Author as offered in a select list
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AuthorChoice {
    pub id: i32,
    pub name: String,
}
