//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, catalog, health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "LocalLibrary API",
        version = "1.0.0",
        description = "Catalog of a small local library: books, authors, copies and loans"
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Home
        catalog::index,
        // Books
        books::list_books,
        books::book_detail,
        books::create_book_form,
        books::create_book,
        books::update_book_form,
        books::update_book,
        books::delete_book_form,
        books::delete_book,
        // Authors
        authors::list_authors,
        authors::author_detail,
        authors::create_author_form,
        authors::create_author,
        authors::update_author_form,
        authors::update_author,
        authors::delete_author_form,
        authors::delete_author,
        // Loans
        loans::my_borrowed,
        loans::all_borrowed,
        loans::renew_form,
        loans::renew,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UserInfo,
            crate::models::user::User,
            crate::models::user::Permission,
            // Catalog
            catalog::IndexContext,
            crate::services::catalog::CatalogSummary,
            crate::services::catalog::BookChoices,
            crate::models::genre::Genre,
            crate::models::language::Language,
            crate::pagination::PageInfo,
            // Books
            books::BookDetailContext,
            books::BookDeleteContext,
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookDetail,
            // Authors
            authors::AuthorDetailContext,
            authors::AuthorDeleteContext,
            crate::models::author::Author,
            crate::models::author::AuthorDetail,
            crate::models::author::AuthorChoice,
            // Loans
            crate::models::book_instance::BookInstance,
            crate::models::book_instance::BorrowedCopy,
            crate::models::book_instance::LoanStatus,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "catalog", description = "Home page"),
        (name = "books", description = "Books"),
        (name = "authors", description = "Authors"),
        (name = "loans", description = "Borrowed copies and renewal")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
