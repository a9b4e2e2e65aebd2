//! Cookie-backed visitor sessions

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};

use crate::{
    config::SessionConfig,
    error::{AppError, AppResult},
    services::sessions::Session,
    AppState,
};

/// Loads the session named by the session cookie, or starts a new one
#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let sessions = &state.services.sessions;
        let jar = CookieJar::from_headers(&parts.headers);
        let id = jar
            .get(&sessions.config().cookie_name)
            .map(|cookie| cookie.value().to_string());

        sessions.load(id.as_deref()).await
    }
}

/// Cookie carrying the session id
pub fn session_cookie(session_id: &str, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(config.ttl_seconds as i64))
        .secure(config.secure_cookie)
        .build()
}

/// Persist the session and return the jar that points the client at it.
/// The cookie is re-issued on every save so its expiry slides forward.
pub async fn commit(state: &AppState, session: &Session) -> AppResult<CookieJar> {
    let sessions = &state.services.sessions;
    sessions.save(session).await?;
    Ok(CookieJar::new().add(session_cookie(session.id(), sessions.config())))
}
