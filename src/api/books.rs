//! Book pages: list, detail and the create/update/delete forms

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    forms::{BookForm, FormState},
    models::book::{Book, BookDetail, BookShort},
    pagination::{ListContext, PageQuery},
    services::catalog::BookChoices,
    AppState,
};

use super::Rendered;

const FORM_TEMPLATE: &str = "catalog/book_form.html";
const CONFIRM_DELETE_TEMPLATE: &str = "catalog/book_confirm_delete.html";

#[derive(Serialize, ToSchema)]
pub struct BookDetailContext {
    pub book: BookDetail,
}

/// Context of the book create/update page
#[derive(Serialize)]
pub struct BookFormContext {
    pub form: FormState<BookForm>,
    pub choices: BookChoices,
    /// Book being edited; absent on create
    pub object: Option<Book>,
}

#[derive(Serialize, ToSchema)]
pub struct BookDeleteContext {
    pub object: Book,
}

fn detail_url(id: i32) -> String {
    format!("/catalog/book/{}", id)
}

/// Paginated list of books, 5 per page
#[utoipa::path(
    get,
    path = "/catalog/books",
    tag = "books",
    params(PageQuery),
    responses(
        (status = 200, description = "catalog/book_list.html context"),
        (status = 404, description = "Page out of range", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Rendered<ListContext<BookShort>>> {
    let context = state.services.catalog.list_books(query.page.as_deref()).await?;
    Ok(Rendered::new("catalog/book_list.html", context))
}

/// Book with its author, language, genres and copies
#[utoipa::path(
    get,
    path = "/catalog/book/{pk}",
    tag = "books",
    params(("pk" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "catalog/book_detail.html context", body = BookDetailContext),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn book_detail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Rendered<BookDetailContext>> {
    let book = state.services.catalog.book_detail(id).await?;
    Ok(Rendered::new("catalog/book_detail.html", BookDetailContext { book }))
}

/// Empty book form with the available choices
#[utoipa::path(
    get,
    path = "/catalog/book/create",
    tag = "books",
    responses((status = 200, description = "catalog/book_form.html context"))
)]
pub async fn create_book_form(State(state): State<AppState>) -> AppResult<Rendered<BookFormContext>> {
    let choices = state.services.catalog.book_choices().await?;
    Ok(Rendered::new(
        FORM_TEMPLATE,
        BookFormContext {
            form: FormState::unbound(BookForm::default()),
            choices,
            object: None,
        },
    ))
}

/// Create a book, then redirect to its detail page
#[utoipa::path(
    post,
    path = "/catalog/book/create",
    tag = "books",
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "Book form"),
    responses(
        (status = 303, description = "Created, redirect to the detail page"),
        (status = 422, description = "Form re-rendered with errors")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Form(form): Form<BookForm>,
) -> AppResult<Response> {
    match state.services.catalog.create_book(&form).await? {
        Ok(book) => Ok(Redirect::to(&detail_url(book.id)).into_response()),
        Err(errors) => {
            let choices = state.services.catalog.book_choices().await?;
            let context = BookFormContext {
                form: FormState::invalid(form, errors),
                choices,
                object: None,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Rendered::new(FORM_TEMPLATE, context)).into_response())
        }
    }
}

/// Book form prefilled from the stored book
#[utoipa::path(
    get,
    path = "/catalog/book/{pk}/update",
    tag = "books",
    params(("pk" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "catalog/book_form.html context"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book_form(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Rendered<BookFormContext>> {
    let catalog = &state.services.catalog;
    let book = catalog.get_book(id).await?;
    let genre_ids = catalog.book_genre_ids(id).await?;
    let choices = catalog.book_choices().await?;

    Ok(Rendered::new(
        FORM_TEMPLATE,
        BookFormContext {
            form: FormState::unbound(BookForm::for_update(&book, genre_ids)),
            choices,
            object: Some(book),
        },
    ))
}

/// Update a book and its genres, then redirect to its detail page
#[utoipa::path(
    post,
    path = "/catalog/book/{pk}/update",
    tag = "books",
    params(("pk" = i32, Path, description = "Book ID")),
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "Book form"),
    responses(
        (status = 303, description = "Updated, redirect to the detail page"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Form re-rendered with errors")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Form(form): Form<BookForm>,
) -> AppResult<Response> {
    let catalog = &state.services.catalog;
    match catalog.update_book(id, &form).await? {
        Ok(book) => Ok(Redirect::to(&detail_url(book.id)).into_response()),
        Err(errors) => {
            let object = catalog.get_book(id).await?;
            let choices = catalog.book_choices().await?;
            let context = BookFormContext {
                form: FormState::invalid(form, errors),
                choices,
                object: Some(object),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Rendered::new(FORM_TEMPLATE, context)).into_response())
        }
    }
}

/// Delete confirmation page
#[utoipa::path(
    get,
    path = "/catalog/book/{pk}/delete",
    tag = "books",
    params(("pk" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "catalog/book_confirm_delete.html context", body = BookDeleteContext),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book_form(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Rendered<BookDeleteContext>> {
    let object = state.services.catalog.get_book(id).await?;
    Ok(Rendered::new(CONFIRM_DELETE_TEMPLATE, BookDeleteContext { object }))
}

/// Delete a book; refused while copies still reference it
#[utoipa::path(
    post,
    path = "/catalog/book/{pk}/delete",
    tag = "books",
    params(("pk" = i32, Path, description = "Book ID")),
    responses(
        (status = 303, description = "Deleted, redirect to the book list"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Copies still reference the book", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Redirect> {
    state.services.catalog.delete_book(id).await?;
    Ok(Redirect::to("/catalog/books"))
}
