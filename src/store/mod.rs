// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Counter and set store abstraction.
//!
//! All mutation of shared abuse state goes through the atomic primitives of
//! [`CounterStore`]: increment-with-expiry, set-add and set-contains. Two
//! implementations exist:
//!
//! - [`RedisStore`]: the shared store of record, visible to every node
//! - [`MemoryStore`]: process-local, used as the degraded fallback and in tests

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Store failure. Callers decide whether to fail open or fall back locally.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Local store full ({max_keys} live keys)")]
    CapacityExceeded { max_keys: usize },
}

/// State of a fixed-window counter right after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Counter value after this increment
    pub count: u64,
    /// Time until the window (and the key) expires
    pub expires_in: Duration,
}

/// Atomic counter and set primitives over a key-value store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` and, if the key is new, set its expiry to `ttl`.
    ///
    /// Must be a single atomic step: concurrent callers each observe a
    /// distinct post-increment count.
    async fn increment_with_expiry(&self, key: &str, ttl: Duration)
        -> Result<WindowCount, StoreError>;

    /// Add `member` to the set at `set_key`.
    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError>;

    /// Test membership of `member` in the set at `set_key`.
    async fn set_contains(&self, set_key: &str, member: &str) -> Result<bool, StoreError>;

    /// Short backend name used in logs and metric labels.
    fn backend(&self) -> &'static str;
}
