//! LocalLibrary Server
//!
//! Catalog and loan tracking for a small local library.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use locallibrary::{
    api,
    config::{AppConfig, SessionBackend},
    repository::Repository,
    services::{
        sessions::{MemorySessionStore, RedisSessionStore, SessionStore},
        Services,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing; the guard flushes the log file on exit
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("locallibrary={},tower_http=debug", config.logging.level).into());

    let (file_writer, _guard) = match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "locallibrary.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| fmt::layer().with_ansi(false).with_writer(writer));

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    tracing::info!("Starting LocalLibrary Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let session_store: Arc<dyn SessionStore> = match config.session.backend {
        SessionBackend::Redis => {
            let store = RedisSessionStore::new(&config.redis.url).await?;
            tracing::info!("Connected to Redis");
            Arc::new(store)
        }
        SessionBackend::Memory => {
            tracing::warn!("Using in-memory sessions; they are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
    };

    let services = Services::new(Repository::new(pool), &config, session_store);

    if let Some(admin) = &config.auth.bootstrap_admin {
        services.users.ensure_superuser(admin).await?;
    }

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
