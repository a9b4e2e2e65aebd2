//! Book model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{book_instance::BookInstance, genre::Genre, language::Language};

/// Book row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author_id: Option<i32>,
    pub summary: String,
    pub isbn: String,
    pub language_id: Option<i32>,
}

/// Short book representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author_id: Option<i32>,
    pub author_name: Option<String>,
}

/// Book with its relations resolved, for the detail page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub author_name: Option<String>,
    pub language: Option<Language>,
    pub genres: Vec<Genre>,
    /// Physical copies of this book
    pub copies: Vec<BookInstance>,
}

/// Cleaned book fields, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFields {
    pub title: String,
    pub author_id: i32,
    pub summary: String,
    pub isbn: String,
    pub language_id: i32,
    pub genre_ids: Vec<i32>,
}
