// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Store doubles for outage simulation.

use anon_inbox::store::{CounterStore, MemoryStore, StoreError, WindowCount};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Shared store that is never reachable.
#[derive(Debug, Default)]
pub struct UnreachableStore {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CounterStore for UnreachableStore {
    async fn increment_with_expiry(&self, _key: &str, _ttl: Duration) -> Result<WindowCount, StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(StoreError::Timeout(Duration::from_secs(1)))
    }

    async fn set_add(&self, _set_key: &str, _member: &str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_contains(&self, _set_key: &str, _member: &str) -> Result<bool, StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn backend(&self) -> &'static str {
        "unreachable"
    }
}

/// In-memory store that can be switched off and on to simulate an outage.
#[derive(Debug, Default)]
pub struct SwitchableStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl SwitchableStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::Release);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::Acquire) {
            Err(StoreError::Unavailable("switched off".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CounterStore for SwitchableStore {
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<WindowCount, StoreError> {
        self.check()?;
        self.inner.increment_with_expiry(key, ttl).await
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set_add(set_key, member).await
    }

    async fn set_contains(&self, set_key: &str, member: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set_contains(set_key, member).await
    }

    fn backend(&self) -> &'static str {
        "switchable"
    }
}
