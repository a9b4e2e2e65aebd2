//! Borrowed copies and librarian renewal

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    forms::{FormState, RenewBookForm},
    models::book_instance::BorrowedCopy,
    pagination::{ListContext, PageQuery},
    AppState,
};

use super::{AuthenticatedUser, Librarian, Rendered};

const RENEW_TEMPLATE: &str = "catalog/book_renew_librarian.html";

/// Context of the renewal page
#[derive(Serialize)]
pub struct RenewContext {
    pub form: FormState<RenewBookForm>,
    pub book_instance: BorrowedCopy,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Copies on loan to the current user
#[utoipa::path(
    get,
    path = "/catalog/mybooks",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "catalog/bookinstance_list_borrowed_user.html context"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Page out of range", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_borrowed(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Rendered<ListContext<BorrowedCopy>>> {
    let context = state
        .services
        .loans
        .list_borrowed(Some(claims.user_id), query.page.as_deref(), today())
        .await?;
    Ok(Rendered::new("catalog/bookinstance_list_borrowed_user.html", context))
}

/// Every copy on loan, for librarians
#[utoipa::path(
    get,
    path = "/catalog/borrowed",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "catalog/bookinstance_list_borrowed.html context"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Page out of range", body = crate::error::ErrorResponse)
    )
)]
pub async fn all_borrowed(
    State(state): State<AppState>,
    _librarian: Librarian,
    Query(query): Query<PageQuery>,
) -> AppResult<Rendered<ListContext<BorrowedCopy>>> {
    let context = state
        .services
        .loans
        .list_borrowed(None, query.page.as_deref(), today())
        .await?;
    Ok(Rendered::new("catalog/bookinstance_list_borrowed.html", context))
}

/// Renewal form proposing a due date three weeks from today
#[utoipa::path(
    get,
    path = "/catalog/book/{pk}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("pk" = Uuid, Path, description = "Book instance ID")),
    responses(
        (status = 200, description = "catalog/book_renew_librarian.html context"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Book instance not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn renew_form(
    State(state): State<AppState>,
    _librarian: Librarian,
    Path(id): Path<Uuid>,
) -> AppResult<Rendered<RenewContext>> {
    let today = today();
    let book_instance = state.services.loans.instance_details(id, today).await?;

    Ok(Rendered::new(
        RENEW_TEMPLATE,
        RenewContext {
            form: FormState::unbound(RenewBookForm::initial(today)),
            book_instance,
        },
    ))
}

/// Set a new due date, then redirect to the borrowed list
#[utoipa::path(
    post,
    path = "/catalog/book/{pk}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("pk" = Uuid, Path, description = "Book instance ID")),
    request_body(content = String, content_type = "application/x-www-form-urlencoded", description = "renewal_date field"),
    responses(
        (status = 303, description = "Renewed, redirect to /catalog/borrowed"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing catalog.can_mark_returned", body = crate::error::ErrorResponse),
        (status = 404, description = "Book instance not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Form re-rendered with errors")
    )
)]
pub async fn renew(
    State(state): State<AppState>,
    _librarian: Librarian,
    Path(id): Path<Uuid>,
    Form(form): Form<RenewBookForm>,
) -> AppResult<Response> {
    let today = today();
    let book_instance = state.services.loans.instance_details(id, today).await?;

    match form.clean(today) {
        Ok(due_back) => {
            state.services.loans.renew(id, due_back).await?;
            Ok(Redirect::to("/catalog/borrowed").into_response())
        }
        Err(errors) => {
            let context = RenewContext {
                form: FormState::invalid(form, errors),
                book_instance,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Rendered::new(RENEW_TEMPLATE, context)).into_response())
        }
    }
}
