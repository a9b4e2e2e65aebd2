//! LocalLibrary catalog server
//!
//! Books, authors and their copies, with loan tracking for librarians.
//! Pages are served as JSON: the template they would render plus its context.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod forms;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
