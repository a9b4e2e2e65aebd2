//! Home page

use axum::{extract::State, response::Redirect};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    services::{
        catalog::{count_visit, CatalogSummary},
        sessions::Session,
    },
    AppState,
};

use super::{session::commit, Rendered};

/// Home page context
#[derive(Serialize, ToSchema)]
pub struct IndexContext {
    #[serde(flatten)]
    pub summary: CatalogSummary,
    /// Visits in this session before the current one
    pub num_visits: i64,
}

/// Root redirects to the catalog
pub async fn root() -> Redirect {
    Redirect::to("/catalog/")
}

/// Catalog home page with counts and the session visit counter
#[utoipa::path(
    get,
    path = "/catalog/",
    tag = "catalog",
    responses(
        (status = 200, description = "index.html context", body = IndexContext)
    )
)]
pub async fn index(
    State(state): State<AppState>,
    mut session: Session,
) -> AppResult<(CookieJar, Rendered<IndexContext>)> {
    let summary = state.services.catalog.summary().await?;

    let num_visits = count_visit(&mut session)?;
    let jar = commit(&state, &session).await?;

    Ok((
        jar,
        Rendered::new("index.html", IndexContext { summary, num_visits }),
    ))
}
