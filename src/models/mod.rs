//! Data models for the library catalog

pub mod author;
pub mod book;
pub mod book_instance;
pub mod genre;
pub mod language;
pub mod user;

// Re-export commonly used types
pub use author::{Author, AuthorDetail};
pub use book::{Book, BookDetail, BookShort};
pub use book_instance::{BookInstance, BorrowedCopy, LoanStatus};
pub use genre::Genre;
pub use language::Language;
pub use user::{Permission, User, UserClaims};
