//! JSON-valued Redis store.
//!
//! [`RedisStore`] is the object-safe byte-level interface; [`RedisStoreExt`]
//! adds the typed, JSON-encoding operations on top of any store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::config::{ConfigError, env_or, parse_env};

const SCAN_START_CURSOR: u64 = 0;
const SCAN_COUNT: usize = 100;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis command or connection failure
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Connection settings for [`RedisClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisStoreConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database index
    pub db: i64,
    /// Read timeout in seconds, 0 for none
    pub read_timeout_in_seconds: u64,
    /// Write timeout in seconds, 0 for none
    pub write_timeout_in_seconds: u64,
    /// Connect timeout in seconds, 0 for none
    pub dial_timeout_in_seconds: u64,
    /// Deployment mode, `standalone` or `cluster`
    pub mode: String,
    /// Password, if the server requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            read_timeout_in_seconds: 3,
            write_timeout_in_seconds: 3,
            dial_timeout_in_seconds: 5,
            mode: "standalone".to_string(),
            password: None,
        }
    }
}

impl RedisStoreConfig {
    /// Load from `REDIS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseEnv`] for malformed numeric values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: env_or("REDIS_HOST", &defaults.host),
            port: parse_env("REDIS_PORT", defaults.port)?,
            db: parse_env("REDIS_DB", defaults.db)?,
            read_timeout_in_seconds: parse_env("REDIS_READ_TIMEOUT", defaults.read_timeout_in_seconds)?,
            write_timeout_in_seconds: parse_env("REDIS_WRITE_TIMEOUT", defaults.write_timeout_in_seconds)?,
            dial_timeout_in_seconds: parse_env("REDIS_DIAL_TIMEOUT", defaults.dial_timeout_in_seconds)?,
            mode: env_or("REDIS_MODE", &defaults.mode),
            password: std::env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
        })
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..RedisConnectionInfo::default()
            },
        }
    }

    /// Timeout applied to each command: the longer of read and write.
    fn response_timeout(&self) -> Option<Duration> {
        let secs = self.read_timeout_in_seconds.max(self.write_timeout_in_seconds);
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    fn connect_timeout(&self) -> Option<Duration> {
        (self.dial_timeout_in_seconds > 0).then(|| Duration::from_secs(self.dial_timeout_in_seconds))
    }
}

/// Byte-level key/value store with expiry.
#[async_trait]
pub trait RedisStore: Send + Sync {
    /// Store `value` under `key`; a zero `expiry` keeps it until deleted.
    async fn set_raw(&self, key: &str, value: Vec<u8>, expiry: Duration) -> StoreResult<()>;

    /// Store `value` only if `key` is absent. Returns whether it was stored.
    async fn set_nx_raw(&self, key: &str, value: Vec<u8>, expiry: Duration) -> StoreResult<bool>;

    /// Value stored under `key`.
    async fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Remove every key matching the glob `pattern`.
    async fn delete_all(&self, pattern: &str) -> StoreResult<()>;
}

/// Typed operations over any [`RedisStore`], with values stored as JSON.
#[async_trait]
pub trait RedisStoreExt: RedisStore {
    /// Store `value` for `expiry_in_minutes` minutes.
    async fn set<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T, expiry_in_minutes: u64) -> StoreResult<()> {
        let payload = serde_json::to_vec(value)?;
        self.set_raw(key, payload, Duration::from_secs(expiry_in_minutes * 60)).await
    }

    /// Store `value` for `expiry_in_seconds` seconds.
    async fn set_in_seconds<T: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiry_in_seconds: u64,
    ) -> StoreResult<()> {
        let payload = serde_json::to_vec(value)?;
        self.set_raw(key, payload, Duration::from_secs(expiry_in_seconds)).await
    }

    /// Store `value` for `expiry_in_minutes` minutes unless `key` exists.
    async fn set_nx<T: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiry_in_minutes: u64,
    ) -> StoreResult<bool> {
        let payload = serde_json::to_vec(value)?;
        self.set_nx_raw(key, payload, Duration::from_secs(expiry_in_minutes * 60)).await
    }

    /// Value stored under `key`, decoded from JSON.
    async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

impl<S: RedisStore + ?Sized> RedisStoreExt for S {}

/// [`RedisStore`] over a shared connection manager.
#[derive(Clone)]
pub struct RedisClient {
    conn: Arc<RwLock<ConnectionManager>>,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connect with `config` and check the server answers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] when the server is unreachable.
    pub async fn connect(config: &RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.connection_info())?;
        let mut manager_config = ConnectionManagerConfig::new();
        if let Some(timeout) = config.connect_timeout() {
            manager_config = manager_config.set_connection_timeout(timeout);
        }
        if let Some(timeout) = config.response_timeout() {
            manager_config = manager_config.set_response_timeout(timeout);
        }
        let mut conn = ConnectionManager::new_with_config(client, manager_config).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(host = %config.host, port = config.port, db = config.db, "connected to redis");

        Ok(Self {
            conn: Arc::new(RwLock::new(conn)),
        })
    }
}

#[async_trait]
impl RedisStore for RedisClient {
    #[instrument(name = "redis.set", skip(self, value))]
    async fn set_raw(&self, key: &str, value: Vec<u8>, expiry: Duration) -> StoreResult<()> {
        let mut conn = self.conn.write().await;
        if expiry.is_zero() {
            conn.set::<_, _, ()>(key, value).await?;
        } else {
            conn.set_ex::<_, _, ()>(key, value, expiry.as_secs().max(1)).await?;
        }
        Ok(())
    }

    #[instrument(name = "redis.set_nx", skip(self, value))]
    async fn set_nx_raw(&self, key: &str, value: Vec<u8>, expiry: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.write().await;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if !expiry.is_zero() {
            cmd.arg("EX").arg(expiry.as_secs().max(1));
        }
        let reply: Option<String> = cmd.query_async(&mut *conn).await?;
        Ok(reply.is_some())
    }

    #[instrument(name = "redis.get", skip(self))]
    async fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.write().await;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(name = "redis.del", skip(self))]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.write().await;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    #[instrument(name = "redis.delete_all", skip(self))]
    async fn delete_all(&self, pattern: &str) -> StoreResult<()> {
        let mut conn = self.conn.write().await;
        let mut cursor = SCAN_START_CURSOR;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut *conn)
                .await
                .inspect_err(|err| error!(error = %err, "error scanning keys"))?;

            info!(count = keys.len(), "keys found for deletion");
            if !keys.is_empty() {
                let mut pipe = redis::pipe();
                for key in &keys {
                    pipe.del(key).ignore();
                }
                let () = pipe
                    .query_async(&mut *conn)
                    .await
                    .inspect_err(|err| error!(error = %err, "error deleting keys"))?;
            }

            if next == 0 {
                debug!("scan cursor exhausted");
                return Ok(());
            }
            cursor = next;
        }
    }
}
