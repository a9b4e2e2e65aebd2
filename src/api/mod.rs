//! HTTP handlers for the catalog pages
//!
//! Pages answer with the name of the template they would render and its
//! context, serialized as JSON.

pub mod auth;
pub mod authors;
pub mod books;
pub mod catalog;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod session;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    models::user::{Permission, UserClaims},
    AppState,
};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Authenticated user holding `catalog.can_mark_returned`.
///
/// Placed before `Path` and `Form` in a handler's arguments, so callers
/// without the permission get 403 whatever the rest of the request holds.
pub struct Librarian(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for Librarian {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) = AuthenticatedUser::from_request_parts(parts, state).await?;
        claims.require_permission(Permission::CanMarkReturned)?;
        Ok(Librarian(claims))
    }
}

/// A named template together with the context it is rendered with
#[derive(Debug, Serialize)]
pub struct Rendered<C> {
    pub template: &'static str,
    pub context: C,
}

impl<C> Rendered<C> {
    pub fn new(template: &'static str, context: C) -> Self {
        Self { template, context }
    }
}

impl<C: Serialize> IntoResponse for Rendered<C> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(catalog::root))
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Home
        .route("/catalog/", get(catalog::index))
        // Books
        .route("/catalog/books", get(books::list_books))
        .route("/catalog/book/create", get(books::create_book_form).post(books::create_book))
        .route("/catalog/book/:pk", get(books::book_detail))
        .route("/catalog/book/:pk/update", get(books::update_book_form).post(books::update_book))
        .route("/catalog/book/:pk/delete", get(books::delete_book_form).post(books::delete_book))
        // Authors
        .route("/catalog/authors", get(authors::list_authors))
        .route("/catalog/author/create", get(authors::create_author_form).post(authors::create_author))
        .route("/catalog/author/:pk", get(authors::author_detail))
        .route("/catalog/author/:pk/update", get(authors::update_author_form).post(authors::update_author))
        .route("/catalog/author/:pk/delete", get(authors::delete_author_form).post(authors::delete_author))
        // Loans
        .route("/catalog/mybooks", get(loans::my_borrowed))
        .route("/catalog/borrowed", get(loans::all_borrowed))
        .route("/catalog/book/:pk/renew", get(loans::renew_form).post(loans::renew))
        .with_state(state);

    app.merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use chrono::{Duration, Local, NaiveDate, Utc};
    use serde_json::Value;
    use sqlx::{postgres::PgPoolOptions, PgPool};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        forms::INVALID_CHOICE,
        repository::Repository,
        services::{sessions::MemorySessionStore, Services},
    };

    /// State whose pool never connects; requests that reach the database fail
    fn test_app() -> (Router, Arc<AppConfig>) {
        let pool = PgPoolOptions::new()
            .connect_lazy(&AppConfig::default().database.url)
            .unwrap();
        app_with_pool(pool)
    }

    fn app_with_pool(pool: PgPool) -> (Router, Arc<AppConfig>) {
        let config = Arc::new(AppConfig::default());
        let services = Services::new(
            Repository::new(pool),
            &config,
            Arc::new(MemorySessionStore::new()),
        );
        let state = AppState {
            config: config.clone(),
            services: Arc::new(services),
        };
        (router(state), config)
    }

    fn token(config: &AppConfig, permissions: &[Permission]) -> String {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "reader".to_string(),
            user_id: 7,
            is_superuser: false,
            permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
            exp: now + 3600,
            iat: now,
        }
        .create_token(&config.auth.jwt_secret)
        .unwrap()
    }

    fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, bearer: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_root_redirects_to_catalog() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/catalog/");
    }

    #[tokio::test]
    async fn test_mybooks_requires_login() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/catalog/mybooks", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], 2);
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let (app, _) = test_app();
        let response = app
            .oneshot(get("/catalog/borrowed", Some("not-a-jwt")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_borrowed_requires_permission() {
        let (app, config) = test_app();
        let token = token(&config, &[]);
        let response = app
            .oneshot(get("/catalog/borrowed", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], 3);
    }

    #[tokio::test]
    async fn test_renew_gate_runs_before_lookup() {
        let (app, config) = test_app();
        let token = token(&config, &[]);
        let uri = format!("/catalog/book/{}/renew", uuid::Uuid::new_v4());

        let response = app.clone().oneshot(get(&uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_form(&uri, Some(&token), "renewal_date=2020-01-01"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_author_create_form_shows_placeholder_dates() {
        let (app, config) = test_app();
        let token = token(&config, &[Permission::CanMarkReturned]);
        let response = app
            .oneshot(get("/catalog/author/create", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["template"], "catalog/author_form.html");
        assert_eq!(body["context"]["form"]["fields"]["date_of_birth"], "05/01/1965");
        assert_eq!(body["context"]["form"]["fields"]["date_of_death"], "05/01/2018");
        assert_eq!(body["context"]["form"]["is_bound"], false);
    }

    #[tokio::test]
    async fn test_invalid_author_is_rerendered() {
        let (app, config) = test_app();
        let token = token(&config, &[Permission::CanMarkReturned]);
        let response = app
            .oneshot(post_form(
                "/catalog/author/create",
                Some(&token),
                "first_name=&last_name=Austen&date_of_birth=someday",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        let errors = &body["context"]["form"]["errors"];
        assert_eq!(errors["first_name"][0], "This field is required.");
        assert_eq!(errors["date_of_birth"][0], "Enter a valid date.");
        assert_eq!(body["context"]["form"]["fields"]["last_name"], "Austen");
    }

    #[tokio::test]
    async fn test_author_create_without_permission() {
        let (app, config) = test_app();
        let token = token(&config, &[]);
        let response = app
            .oneshot(post_form("/catalog/author/create", Some(&token), "first_name=Jane&last_name=Austen"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_gate_runs_before_path_and_body_parsing() {
        let (app, config) = test_app();
        let token = token(&config, &[]);

        let response = app
            .clone()
            .oneshot(post_form("/catalog/book/not-a-uuid/renew", Some(&token), "renewal_date=%zz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(post_form("/catalog/author/abc/update", Some(&token), "first_name=%zz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    // Database-backed tests; `sqlx::test` creates a fresh database per test
    // from DATABASE_URL and applies the migrations.

    struct Catalog {
        author_id: i32,
        language_id: i32,
        book_id: i32,
        on_loan: Uuid,
        due_back: NaiveDate,
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// One book with three copies: on loan, available and in maintenance
    async fn seed(pool: &PgPool) -> Catalog {
        let author_id: i32 = sqlx::query_scalar(
            "INSERT INTO authors (first_name, last_name) VALUES ('Terry', 'Pratchett') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        let language_id: i32 =
            sqlx::query_scalar("INSERT INTO languages (name) VALUES ('English') RETURNING id")
                .fetch_one(pool)
                .await
                .unwrap();
        let genre_id: i32 =
            sqlx::query_scalar("INSERT INTO genres (name) VALUES ('Science fiction') RETURNING id")
                .fetch_one(pool)
                .await
                .unwrap();
        let book_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, author_id, summary, isbn, language_id)
            VALUES ('Small Gods', $1, 'Om returns as a tortoise.', '9780552152976', $2)
            RETURNING id
            "#,
        )
        .bind(author_id)
        .bind(language_id)
        .fetch_one(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO book_genres (book_id, genre_id) VALUES ($1, $2)")
            .bind(book_id)
            .bind(genre_id)
            .execute(pool)
            .await
            .unwrap();
        let borrower_id: i32 = sqlx::query_scalar(
            "INSERT INTO users (username, password) VALUES ('reader', 'unused') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();

        let on_loan = Uuid::new_v4();
        let due_back = today() + Duration::days(5);
        sqlx::query(
            r#"
            INSERT INTO book_instances (id, book_id, imprint, due_back, borrower_id, status)
            VALUES ($1, $2, 'Corgi, 1993', $3, $4, 'o'),
                   ($5, $2, 'Corgi, 1994', NULL, NULL, 'a'),
                   ($6, $2, 'Gollancz, 1992', NULL, NULL, 'm')
            "#,
        )
        .bind(on_loan)
        .bind(book_id)
        .bind(due_back)
        .bind(borrower_id)
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .execute(pool)
        .await
        .unwrap();

        Catalog {
            author_id,
            language_id,
            book_id,
            on_loan,
            due_back,
        }
    }

    async fn stored_due_back(pool: &PgPool, id: Uuid) -> Option<NaiveDate> {
        sqlx::query_scalar("SELECT due_back FROM book_instances WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_renewal_moves_due_back(pool: PgPool) {
        let catalog = seed(&pool).await;
        let (app, config) = app_with_pool(pool.clone());
        let token = token(&config, &[Permission::CanMarkReturned]);

        let renewed = today() + Duration::weeks(3);
        let response = app
            .oneshot(post_form(
                &format!("/catalog/book/{}/renew", catalog.on_loan),
                Some(&token),
                &format!("renewal_date={}", renewed.format("%Y-%m-%d")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/catalog/borrowed");
        assert_eq!(stored_due_back(&pool, catalog.on_loan).await, Some(renewed));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_invalid_renewal_keeps_due_back(pool: PgPool) {
        let catalog = seed(&pool).await;
        let (app, config) = app_with_pool(pool.clone());
        let token = token(&config, &[Permission::CanMarkReturned]);
        let uri = format!("/catalog/book/{}/renew", catalog.on_loan);

        let past = today() - Duration::days(1);
        let response = app
            .clone()
            .oneshot(post_form(
                &uri,
                Some(&token),
                &format!("renewal_date={}", past.format("%Y-%m-%d")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(
            body["context"]["form"]["errors"]["renewal_date"][0],
            "Invalid date - renewal in past"
        );
        assert_eq!(body["context"]["book_instance"]["borrower_username"], "reader");

        let too_late = today() + Duration::weeks(4) + Duration::days(1);
        let response = app
            .oneshot(post_form(
                &uri,
                Some(&token),
                &format!("renewal_date={}", too_late.format("%Y-%m-%d")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(stored_due_back(&pool, catalog.on_loan).await, Some(catalog.due_back));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_renew_unknown_copy_is_not_found(pool: PgPool) {
        seed(&pool).await;
        let (app, config) = app_with_pool(pool);
        let token = token(&config, &[Permission::CanMarkReturned]);

        let response = app
            .oneshot(get(&format!("/catalog/book/{}/renew", Uuid::new_v4()), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], 5);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_home_page_counts(pool: PgPool) {
        seed(&pool).await;
        let (app, _) = app_with_pool(pool);

        let response = app.oneshot(get("/catalog/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("sessionid="));
        assert!(cookie.contains("HttpOnly"));

        let body = json_body(response).await;
        let context = &body["context"];
        assert_eq!(body["template"], "index.html");
        assert_eq!(context["num_books"], 1);
        assert_eq!(context["num_authors"], 1);
        assert_eq!(context["num_instances"], 3);
        assert_eq!(context["num_instances_available"], 1);
        assert!(
            context["num_instances_available"].as_i64().unwrap() <= context["num_instances"].as_i64().unwrap()
        );
        assert_eq!(context["fiction_books"][0]["name"], "Science fiction");
        assert_eq!(context["num_visits"], 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_book_with_copies_cannot_be_deleted(pool: PgPool) {
        let catalog = seed(&pool).await;
        let (app, _) = app_with_pool(pool);
        let uri = format!("/catalog/book/{}", catalog.book_id);

        let response = app
            .clone()
            .oneshot(post_form(&format!("{}/delete", uri), None, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["code"], 6);

        let response = app.oneshot(get(&uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["context"]["book"]["copies"].as_array().unwrap().len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_unknown_genre_is_invalid_choice(pool: PgPool) {
        let catalog = seed(&pool).await;
        let (app, _) = app_with_pool(pool.clone());

        let body = format!(
            "title=Mort&author={}&summary=Death+takes+an+apprentice.&isbn=9780552131063&genre=999999&language={}",
            catalog.author_id, catalog.language_id
        );
        let response = app
            .oneshot(post_form("/catalog/book/create", None, &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        let errors = &body["context"]["form"]["errors"];
        assert_eq!(errors["genre"][0], INVALID_CHOICE);
        assert!(errors.get("author").is_none());
        assert_eq!(body["context"]["form"]["fields"]["title"], "Mort");

        let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(books, 1);
    }
}
