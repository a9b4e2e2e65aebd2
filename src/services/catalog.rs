//! Catalog service: home summary, books and authors

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    forms::{add_error, AuthorForm, BookForm, FieldErrors, INVALID_CHOICE},
    models::{
        author::{Author, AuthorChoice, AuthorDetail},
        book::{Book, BookDetail, BookFields, BookShort},
        book_instance::LoanStatus,
        genre::Genre,
        language::Language,
    },
    pagination::{ListContext, Paginator},
    repository::Repository,
    services::sessions::Session,
};

pub const BOOKS_PER_PAGE: i64 = 5;
pub const AUTHORS_PER_PAGE: i64 = 10;

/// Genre name fragment highlighted on the home page
pub const FICTION: &str = "fiction";

const VISITS_KEY: &str = "num_visits";

/// Counts shown on the home page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogSummary {
    pub num_books: i64,
    pub num_instances: i64,
    pub num_instances_available: i64,
    pub num_authors: i64,
    pub fiction_books: Vec<Genre>,
}

/// Everything a book form needs to offer as choices
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookChoices {
    pub authors: Vec<AuthorChoice>,
    pub genres: Vec<Genre>,
    pub languages: Vec<Language>,
}

/// Outcome of a form submission: the saved record, or field errors
pub type Submitted<T> = Result<T, FieldErrors>;

/// Read the visit counter (0 for a fresh session) and store it incremented.
/// Returns the value read.
///
/// Two concurrent requests on one session may both read the same value;
/// the last save wins.
pub fn count_visit(session: &mut Session) -> AppResult<i64> {
    let num_visits = session.get::<i64>(VISITS_KEY).unwrap_or(0);
    session.insert(VISITS_KEY, num_visits + 1)?;
    Ok(num_visits)
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }

    pub async fn summary(&self) -> AppResult<CatalogSummary> {
        let repo = &self.repository;
        let (num_books, num_instances, num_instances_available, num_authors, fiction_books) = tokio::try_join!(
            repo.books.count(),
            repo.book_instances.count(),
            repo.book_instances.count_by_status(LoanStatus::Available),
            repo.authors.count(),
            repo.genres.name_contains(FICTION),
        )?;

        Ok(CatalogSummary {
            num_books,
            num_instances,
            num_instances_available,
            num_authors,
            fiction_books,
        })
    }

    // -----------------------------------------------------------------------
    // Books
    // -----------------------------------------------------------------------

    pub async fn list_books(&self, page: Option<&str>) -> AppResult<ListContext<BookShort>> {
        let count = self.repository.books.count().await?;
        let page_obj = Paginator::new(count, BOOKS_PER_PAGE).page(page)?;
        let books = self
            .repository
            .books
            .list(page_obj.per_page, page_obj.offset)
            .await?;
        Ok(ListContext::new(books, page_obj))
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn book_detail(&self, id: i32) -> AppResult<BookDetail> {
        let book = self.repository.books.get_by_id(id).await?;

        let author_name = match book.author_id {
            Some(author_id) => Some(self.repository.authors.get_by_id(author_id).await?.display_name()),
            None => None,
        };
        let language = match book.language_id {
            Some(language_id) => self.repository.languages.get(language_id).await?,
            None => None,
        };
        let genres = self.repository.books.genres(id).await?;
        let copies = self.repository.book_instances.list_by_book(id).await?;

        Ok(BookDetail {
            book,
            author_name,
            language,
            genres,
            copies,
        })
    }

    /// Genre ids currently linked to a book
    pub async fn book_genre_ids(&self, id: i32) -> AppResult<Vec<i32>> {
        let genres = self.repository.books.genres(id).await?;
        Ok(genres.into_iter().map(|g| g.id).collect())
    }

    pub async fn book_choices(&self) -> AppResult<BookChoices> {
        let (authors, genres, languages) = tokio::try_join!(
            self.repository.authors.choices(),
            self.repository.genres.list(),
            self.repository.languages.list(),
        )?;
        Ok(BookChoices {
            authors,
            genres,
            languages,
        })
    }

    /// Clean the form, then check that every referenced row exists
    async fn clean_book(&self, form: &BookForm) -> AppResult<Submitted<BookFields>> {
        let fields = match form.clean() {
            Ok(fields) => fields,
            Err(errors) => return Ok(Err(errors)),
        };

        let mut errors = FieldErrors::new();
        if !self.repository.authors.exists(fields.author_id).await? {
            add_error(&mut errors, "author", INVALID_CHOICE);
        }
        let found = self.repository.genres.existing_ids(&fields.genre_ids).await?;
        if fields.genre_ids.iter().any(|id| !found.contains(id)) {
            add_error(&mut errors, "genre", INVALID_CHOICE);
        }
        if self.repository.languages.get(fields.language_id).await?.is_none() {
            add_error(&mut errors, "language", INVALID_CHOICE);
        }

        if errors.is_empty() {
            Ok(Ok(fields))
        } else {
            Ok(Err(errors))
        }
    }

    pub async fn create_book(&self, form: &BookForm) -> AppResult<Submitted<Book>> {
        let fields = match self.clean_book(form).await? {
            Ok(fields) => fields,
            Err(errors) => return Ok(Err(errors)),
        };

        let book = self.repository.books.create(&fields).await?;
        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        Ok(Ok(book))
    }

    pub async fn update_book(&self, id: i32, form: &BookForm) -> AppResult<Submitted<Book>> {
        // 404 takes precedence over form errors
        self.repository.books.get_by_id(id).await?;

        let fields = match self.clean_book(form).await? {
            Ok(fields) => fields,
            Err(errors) => return Ok(Err(errors)),
        };

        let book = self.repository.books.update(id, &fields).await?;
        tracing::info!(book_id = book.id, "Book updated");
        Ok(Ok(book))
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Authors
    // -----------------------------------------------------------------------

    pub async fn list_authors(&self, page: Option<&str>) -> AppResult<ListContext<Author>> {
        let count = self.repository.authors.count().await?;
        let page_obj = Paginator::new(count, AUTHORS_PER_PAGE).page(page)?;
        let authors = self
            .repository
            .authors
            .list(page_obj.per_page, page_obj.offset)
            .await?;
        Ok(ListContext::new(authors, page_obj))
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn author_detail(&self, id: i32) -> AppResult<AuthorDetail> {
        let author = self.repository.authors.get_by_id(id).await?;
        let books = self.repository.books.list_by_author(id).await?;
        Ok(AuthorDetail { author, books })
    }

    pub async fn create_author(&self, form: &AuthorForm) -> AppResult<Submitted<Author>> {
        let fields = match form.clean() {
            Ok(fields) => fields,
            Err(errors) => return Ok(Err(errors)),
        };

        let author = self.repository.authors.create(&fields).await?;
        tracing::info!(author_id = author.id, "Author created");
        Ok(Ok(author))
    }

    pub async fn update_author(&self, id: i32, form: &AuthorForm) -> AppResult<Submitted<Author>> {
        self.repository.authors.get_by_id(id).await?;

        let fields = match form.clean() {
            Ok(fields) => fields,
            Err(errors) => return Ok(Err(errors)),
        };

        let author = self.repository.authors.update(id, &fields).await?;
        tracing::info!(author_id = author.id, "Author updated");
        Ok(Ok(author))
    }

    pub async fn delete_author(&self, id: i32) -> AppResult<()> {
        self.repository.authors.delete(id).await?;
        tracing::info!(author_id = id, "Author deleted");
        Ok(())
    }
}
