// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Process-local store.
//!
//! Each primitive runs under one mutex, so increments are linearizable
//! within the process. There is no cross-process guarantee: when this store
//! stands in for Redis every node enforces its own limits.
//!
//! Time comes from `tokio::time::Instant`, so tests can drive window expiry
//! with a paused clock.

use super::{CounterStore, StoreError, WindowCount};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct MemoryState {
    counters: HashMap<String, Counter>,
    sets: HashMap<String, HashSet<String>>,
}

/// In-process counter and set store with logical key expiry.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// Upper bound on live counter keys
    max_keys: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl MemoryStore {
    /// Create a store holding at most `max_keys` live counters.
    pub fn new(max_keys: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            max_keys,
        }
    }

    /// Drop counters whose window has elapsed. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let before = state.counters.len();
        state.counters.retain(|_, counter| counter.expires_at > now);
        let removed = before - state.counters.len();
        if removed > 0 {
            debug!(removed, "Purged expired local windows");
        }
        removed
    }

    /// Number of counter keys, including elapsed ones not yet purged.
    pub async fn len(&self) -> usize {
        self.state.lock().await.counters.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<WindowCount, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if !state.counters.contains_key(key) && state.counters.len() >= self.max_keys {
            state.counters.retain(|_, counter| counter.expires_at > now);
            if state.counters.len() >= self.max_keys {
                return Err(StoreError::CapacityExceeded {
                    max_keys: self.max_keys,
                });
            }
        }

        let counter = state
            .counters
            .entry(key.to_string())
            .or_insert_with(|| Counter {
                count: 0,
                expires_at: now + ttl,
            });

        // An elapsed key behaves as absent: new window, new expiry
        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + ttl;
        }

        counter.count += 1;

        Ok(WindowCount {
            count: counter.count,
            expires_in: counter.expires_at.duration_since(now),
        })
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_contains(&self, set_key: &str, member: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .sets
            .get(set_key)
            .is_some_and(|members| members.contains(member)))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_increment_sets_expiry_once() {
        let store = MemoryStore::default();
        let ttl = Duration::from_secs(60);

        let first = store.increment_with_expiry("k", ttl).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.expires_in, ttl);

        tokio::time::advance(Duration::from_secs(20)).await;

        let second = store.increment_with_expiry("k", ttl).await.unwrap();
        assert_eq!(second.count, 2);
        // Expiry is anchored at the first increment, not extended
        assert_eq!(second.expires_in, Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_ttl() {
        let store = MemoryStore::default();
        let ttl = Duration::from_secs(60);

        for _ in 0..3 {
            store.increment_with_expiry("k", ttl).await.unwrap();
        }
        tokio::time::advance(ttl).await;

        let fresh = store.increment_with_expiry("k", ttl).await.unwrap();
        assert_eq!(fresh.count, 1);
        assert_eq!(fresh.expires_in, ttl);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_reclaims_expired_keys() {
        let store = MemoryStore::new(2);
        let ttl = Duration::from_secs(10);

        store.increment_with_expiry("a", ttl).await.unwrap();
        store.increment_with_expiry("b", ttl).await.unwrap();
        assert!(matches!(
            store.increment_with_expiry("c", ttl).await,
            Err(StoreError::CapacityExceeded { max_keys: 2 })
        ));

        // Existing keys keep counting at capacity
        assert_eq!(store.increment_with_expiry("a", ttl).await.unwrap().count, 2);

        tokio::time::advance(ttl).await;
        assert_eq!(store.increment_with_expiry("c", ttl).await.unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::default();
        store
            .increment_with_expiry("short", Duration::from_secs(5))
            .await
            .unwrap();
        store
            .increment_with_expiry("long", Duration::from_secs(500))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStore::default();
        assert!(!store.set_contains("suspicious-ips", "1.2.3.4").await.unwrap());
        store.set_add("suspicious-ips", "1.2.3.4").await.unwrap();
        store.set_add("suspicious-ips", "1.2.3.4").await.unwrap();
        assert!(store.set_contains("suspicious-ips", "1.2.3.4").await.unwrap());
        assert!(!store.set_contains("suspicious-ips", "1.2.3.5").await.unwrap());
        assert!(!store.set_contains("other-set", "1.2.3.4").await.unwrap());
    }

    #[test]
    fn test_sets_are_independent_of_counters() {
        tokio_test::block_on(async {
            let store = MemoryStore::new(1);
            store.set_add("suspicious-ips", "1.2.3.4").await.unwrap();
            store.set_add("suspicious-ips", "1.2.3.4").await.unwrap();
            assert!(store.is_empty().await);
            assert!(store.set_contains("suspicious-ips", "1.2.3.4").await.unwrap());
        });
    }
}
