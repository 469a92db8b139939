//! Cache Store: serialized snapshots keyed by normalized city, with a TTL.
//!
//! Two backends share one surface. Redis is the production store; the memory
//! backend (`memory://`) keeps entries in-process for local runs and tests.
//! Every Redis operation is bounded by a timeout so an unreachable server
//! costs at most that long per call.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::types::WeatherSnapshot;

pub const MEMORY_URL_SCHEME: &str = "memory://";

/// Longest lifetime of an in-process entry
pub const MAX_MEMORY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to (de)serialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Cache backend, selected from the configured URL.
#[derive(Debug, Clone)]
pub enum CacheStore {
    Redis(Arc<RedisStore>),
    Memory(Arc<MemoryStore>),
}

impl CacheStore {
    /// `memory://` selects the in-process store; anything else is handed to
    /// the Redis client. Nothing connects until the first operation.
    pub fn from_url(url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        if url.starts_with(MEMORY_URL_SCHEME) {
            return Ok(Self::memory());
        }
        Ok(Self::Redis(Arc::new(RedisStore::open(url, op_timeout)?)))
    }

    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryStore::default()))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<WeatherSnapshot>, CacheError> {
        let raw = match self {
            Self::Redis(store) => store.get(key).await?,
            Self::Memory(store) => store.get(key),
        };

        match raw {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Overwrite `key` wholesale. Last write wins.
    pub async fn set(
        &self,
        key: &str,
        snapshot: &WeatherSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_string(snapshot)?;
        match self {
            Self::Redis(store) => store.set(key, value, ttl).await,
            Self::Memory(store) => {
                store.set(key, value, ttl);
                Ok(())
            }
        }
    }

    /// Whether the store answers right now.
    pub async fn ping(&self) -> bool {
        match self {
            Self::Redis(store) => match store.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "cache ping failed");
                    false
                }
            },
            Self::Memory(_) => true,
        }
    }
}

pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    op_timeout: Duration,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.connection.initialized())
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl RedisStore {
    /// Parse the URL. The connection itself is opened lazily and retried on
    /// later calls until it succeeds once; after that the connection manager
    /// reconnects on its own.
    pub fn open(url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: OnceCell::new(),
            op_timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .connection
            .get_or_try_init(|| self.client.get_connection_manager())
            .await?;
        Ok(conn.clone())
    }

    async fn bounded<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, CacheError>
    where
        Fut: Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                operation,
                timeout: self.op_timeout,
            }),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.bounded("get", async {
            let mut conn = self.connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // SETEX rejects 0
        let seconds = ttl.as_secs().max(1);
        self.bounded("set", async {
            let mut conn = self.connection().await?;
            conn.set_ex::<_, _, ()>(key, value, seconds).await?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.bounded("ping", async {
            let mut conn = self.connection().await?;
            let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

/// In-process store. Expired entries are dropped on read and on every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert `key`, dropping every entry that has already expired. A TTL too
    /// large to represent as a deadline is capped at [`MAX_MEMORY_TTL`].
    fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl.min(MAX_MEMORY_TTL))
            .unwrap_or(now);

        let mut entries = self.entries.lock();
        entries.retain(|_, (_, deadline)| *deadline > now);
        entries.insert(key.to_string(), (value, expires_at));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
