//! Business logic services

pub mod catalog;
pub mod loans;
pub mod sessions;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub users: users::UsersService,
    pub sessions: sessions::SessionsService,
}

impl Services {
    /// Create all services with the given repository and session backend
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        session_store: Arc<dyn sessions::SessionStore>,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone()),
            users: users::UsersService::new(repository, config.auth.clone()),
            sessions: sessions::SessionsService::new(session_store, config.session.clone()),
        }
    }
}
