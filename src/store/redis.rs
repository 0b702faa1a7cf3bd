// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Redis-backed shared store.
//!
//! The connection is established lazily on first use so the service can
//! start while Redis is down. Every call, including the connect attempt,
//! runs under the configured timeout; on expiry the in-flight future is
//! dropped and the caller sees [`StoreError::Timeout`].

use super::{CounterStore, StoreError, WindowCount};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// INCR and PEXPIRE-on-first-increment in one round trip; returns the new
/// count and the remaining TTL in milliseconds.
const INCREMENT_WITH_EXPIRY: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
return {count, ttl}
";

/// Shared counter store backed by Redis.
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout", &self.timeout)
            .field("connected", &self.connection.initialized())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a store for `url` without connecting.
    ///
    /// # Errors
    /// Returns error if the URL is malformed.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, RedisError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new(self.client.clone()).await?;
                info!("Connected to Redis");
                Ok::<_, RedisError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }

    /// Run `op` on a connection under the store timeout.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let call = async {
            let conn = self.connection().await?;
            op(conn).await
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<WindowCount, StoreError> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        let (count, pttl): (i64, i64) = self
            .run(|mut conn| async move {
                redis::Script::new(INCREMENT_WITH_EXPIRY)
                    .key(key)
                    .arg(ttl_ms)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        // PTTL is negative only if the key lost its expiry out-of-band
        let expires_in = u64::try_from(pttl).map_or(ttl, Duration::from_millis);
        debug!(key, count, ?expires_in, "Redis window incremented");

        Ok(WindowCount {
            count: u64::try_from(count).unwrap_or(0),
            expires_in,
        })
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        self.run(|mut conn| async move { conn.sadd::<_, _, ()>(set_key, member).await })
            .await
    }

    async fn set_contains(&self, set_key: &str, member: &str) -> Result<bool, StoreError> {
        self.run(|mut conn| async move { conn.sismember::<_, _, bool>(set_key, member).await })
            .await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
