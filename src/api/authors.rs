//! Author pages: list, detail and the librarian-only edit forms

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
    forms::{AuthorForm, FormState},
    models::author::{Author, AuthorDetail},
    pagination::{ListContext, PageQuery},
    AppState,
};

use super::{Librarian, Rendered};

const FORM_TEMPLATE: &str = "catalog/author_form.html";

#[derive(Serialize, ToSchema)]
pub struct AuthorDetailContext {
    pub author: AuthorDetail,
}

#[derive(Serialize)]
pub struct AuthorFormContext {
    pub form: FormState<AuthorForm>,
    /// Author being edited; absent on create
    pub object: Option<Author>,
}

#[derive(Serialize, ToSchema)]
pub struct AuthorDeleteContext {
    pub object: Author,
}

fn detail_url(id: i32) -> String {
    format!("/catalog/author/{}", id)
}

fn invalid_form(form: AuthorForm, errors: crate::forms::FieldErrors, object: Option<Author>) -> Response {
    let context = AuthorFormContext {
        form: FormState::invalid(form, errors),
        object,
    };
    (StatusCode::UNPROCESSABLE_ENTITY, Rendered::new(FORM_TEMPLATE, context)).into_response()
}

/// Paginated list of authors, 10 per page
#[utoipa::path(
    get,
    path = "/catalog/authors",
    tag = "authors",
    params(PageQuery),
    responses(
        (status = 200, description = "catalog/author_list.html context"),
        (status = 404, description = "Page out of range", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_authors(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Rendered<ListContext<Author>>> {
    let context = state.services.catalog.list_authors(query.page.as_deref()).await?;
    Ok(Rendered::new("catalog/author_list.html", context))
}

/// Author with their books
#[utoipa::path(
    get,
    path = "/catalog/author/{pk}",
    tag = "authors",
    params(("pk" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "catalog/author_detail.html context", body = AuthorDetailContext),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn author_detail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Rendered<AuthorDetailContext>> {
    let author = state.services.catalog.author_detail(id).await?;
    Ok(Rendered::new("catalog/author_detail.html", AuthorDetailContext { author }))
}

/// Empty author form with the placeholder dates
#[utoipa::path(
    get,
    path = "/catalog/author/create",
    tag = "authors",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "catalog/author_form.html context"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_author_form(_librarian: Librarian) -> AppResult<Rendered<AuthorFormContext>> {
    Ok(Rendered::new(
        FORM_TEMPLATE,
        AuthorFormContext {
            form: FormState::unbound(AuthorForm::initial()),
            object: None,
        },
    ))
}

/// Create an author, then redirect to the detail page
#[utoipa::path(
    post,
    path = "/catalog/author/create",
    tag = "authors",
    security(("bearer_auth" = [])),
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "Author form"),
    responses(
        (status = 303, description = "Created, redirect to the detail page"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 422, description = "Form re-rendered with errors")
    )
)]
pub async fn create_author(
    State(state): State<AppState>,
    _librarian: Librarian,
    Form(form): Form<AuthorForm>,
) -> AppResult<Response> {
    match state.services.catalog.create_author(&form).await? {
        Ok(author) => Ok(Redirect::to(&detail_url(author.id)).into_response()),
        Err(errors) => Ok(invalid_form(form, errors, None)),
    }
}

/// Author form for an existing author
#[utoipa::path(
    get,
    path = "/catalog/author/{pk}/update",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("pk" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "catalog/author_form.html context"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_author_form(
    State(state): State<AppState>,
    _librarian: Librarian,
    Path(id): Path<i32>,
) -> AppResult<Rendered<AuthorFormContext>> {
    let author = state.services.catalog.get_author(id).await?;
    Ok(Rendered::new(
        FORM_TEMPLATE,
        AuthorFormContext {
            form: FormState::unbound(AuthorForm::for_update(&author)),
            object: Some(author),
        },
    ))
}

/// Update an author, then redirect to the detail page
#[utoipa::path(
    post,
    path = "/catalog/author/{pk}/update",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("pk" = i32, Path, description = "Author ID")),
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "Author form"),
    responses(
        (status = 303, description = "Updated, redirect to the detail page"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Form re-rendered with errors")
    )
)]
pub async fn update_author(
    State(state): State<AppState>,
    _librarian: Librarian,
    Path(id): Path<i32>,
    Form(form): Form<AuthorForm>,
) -> AppResult<Response> {
    let catalog = &state.services.catalog;
    match catalog.update_author(id, &form).await? {
        Ok(author) => Ok(Redirect::to(&detail_url(author.id)).into_response()),
        Err(errors) => {
            let object = catalog.get_author(id).await?;
            Ok(invalid_form(form, errors, Some(object)))
        }
    }
}

/// Delete confirmation page
#[utoipa::path(
    get,
    path = "/catalog/author/{pk}/delete",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("pk" = i32, Path, description = "Author ID")),
    responses(
        (status = 200, description = "catalog/author_confirm_delete.html context", body = AuthorDeleteContext),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author_form(
    State(state): State<AppState>,
    _librarian: Librarian,
    Path(id): Path<i32>,
) -> AppResult<Rendered<AuthorDeleteContext>> {
    let object = state.services.catalog.get_author(id).await?;
    Ok(Rendered::new(
        "catalog/author_confirm_delete.html",
        AuthorDeleteContext { object },
    ))
}

/// Delete an author; their books remain without an author
#[utoipa::path(
    post,
    path = "/catalog/author/{pk}/delete",
    tag = "authors",
    security(("bearer_auth" = [])),
    params(("pk" = i32, Path, description = "Author ID")),
    responses(
        (status = 303, description = "Deleted, redirect to the author list"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<AppState>,
    _librarian: Librarian,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    state.services.catalog.delete_author(id).await?;
    Ok(Redirect::to("/catalog/authors"))
}
