//! Per-visitor session storage
//!
//! A session is a small JSON object keyed by an opaque random id. The id
//! travels in a cookie; the data lives in Redis or, for development and
//! tests, in process memory.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::{
    config::SessionConfig,
    error::{AppError, AppResult},
};

pub type SessionData = Map<String, Value>;

const SESSION_ID_LENGTH: usize = 32;

/// Backend holding session data between requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Data stored under `id`, or `None` when unknown or expired
    async fn load(&self, id: &str) -> AppResult<Option<SessionData>>;

    async fn save(&self, id: &str, data: &SessionData, ttl_seconds: u64) -> AppResult<()>;
}

/// Redis-backed store; one JSON string per session under `session:{id}`
#[derive(Clone)]
pub struct RedisSessionStore {
    client: Client,
}

impl RedisSessionStore {
    /// Create the store and check that Redis answers
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client })
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &str) -> AppResult<Option<SessionData>> {
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn
            .get(Self::key(id))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read session from Redis: {}", e)))?;

        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(data) => Ok(Some(data)),
                Err(e) => {
                    // A corrupt session is treated like an expired one
                    tracing::warn!("Discarding unreadable session: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str, data: &SessionData, ttl_seconds: u64) -> AppResult<()> {
        let mut conn = self.connection().await?;

        let raw = serde_json::to_string(data)
            .map_err(|e| AppError::Internal(format!("Failed to encode session: {}", e)))?;

        conn.set_ex::<_, _, ()>(Self::key(id), raw, ttl_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store session in Redis: {}", e)))?;

        Ok(())
    }
}

/// In-process store; sessions are lost on restart
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, (SessionData, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> AppResult<Option<SessionData>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(id)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(data, _)| data.clone()))
    }

    async fn save(&self, id: &str, data: &SessionData, ttl_seconds: u64) -> AppResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, exp)| *exp > Instant::now());
        entries.insert(id.to_string(), (data.clone(), expires_at));
        Ok(())
    }
}

/// Session of the current visitor
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: SessionData,
}

impl Session {
    /// Fresh session with a random id
    pub fn new() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LENGTH)
            .map(char::from)
            .collect();
        Self {
            id,
            data: SessionData::new(),
        }
    }

    fn existing(id: String, data: SessionData) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Value under `key`; `None` when missing or of another type
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> AppResult<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| AppError::Internal(format!("Failed to encode session value: {}", e)))?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads and persists sessions against the configured store
#[derive(Clone)]
pub struct SessionsService {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionsService {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Session for the id sent by the client, or a new one if the id is
    /// missing, unknown or expired
    pub async fn load(&self, id: Option<&str>) -> AppResult<Session> {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            return Ok(Session::new());
        };

        match self.store.load(id).await? {
            Some(data) => Ok(Session::existing(id.to_string(), data)),
            None => Ok(Session::new()),
        }
    }

    pub async fn save(&self, session: &Session) -> AppResult<()> {
        self.store
            .save(&session.id, &session.data, self.config.ttl_seconds)
            .await
    }
}
