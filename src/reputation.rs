// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sender reputation: the set of addresses flagged as suspicious.
//!
//! Reputation is advisory. Lookups fail open and flags are best-effort:
//! a shared-store failure never blocks a request. While the shared store is
//! unreachable, flags are kept in the process-local store so this node still
//! applies them. Flags have no expiry; clearing one is an administrative
//! action outside this service.

use crate::metrics::Metrics;
use crate::store::CounterStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Flagged-address set over the shared store with a local fallback.
pub struct ReputationStore {
    shared: Arc<dyn CounterStore>,
    local: Arc<dyn CounterStore>,
    set_key: String,
    metrics: Arc<Metrics>,
}

impl ReputationStore {
    pub fn new(
        shared: Arc<dyn CounterStore>,
        local: Arc<dyn CounterStore>,
        set_key: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            shared,
            local,
            set_key: set_key.into(),
            metrics,
        }
    }

    /// Whether `address` is flagged. Fails open.
    pub async fn is_flagged(&self, address: &str) -> bool {
        match self.shared.set_contains(&self.set_key, address).await {
            Ok(flagged) => {
                debug!(address, flagged, "Reputation lookup");
                flagged
            }
            Err(e) => {
                warn!(
                    error = %e,
                    address,
                    backend = self.shared.backend(),
                    "Reputation lookup failed, treating address as not flagged"
                );
                self.metrics
                    .store_failures
                    .with_label_values(&["reputation"])
                    .inc();
                self.local
                    .set_contains(&self.set_key, address)
                    .await
                    .unwrap_or(false)
            }
        }
    }

    /// Flag `address` as suspicious. Best-effort, never retried inline.
    pub async fn flag(&self, address: &str) {
        self.metrics.flags.inc();

        match self.shared.set_add(&self.set_key, address).await {
            Ok(()) => info!(address, "Address flagged as suspicious"),
            Err(e) => {
                warn!(
                    error = %e,
                    address,
                    backend = self.shared.backend(),
                    "Shared flag dropped, keeping it on this node only"
                );
                self.metrics
                    .store_failures
                    .with_label_values(&["reputation"])
                    .inc();
                if let Err(e) = self.local.set_add(&self.set_key, address).await {
                    warn!(error = %e, address, "Local flag dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use std::time::Duration;

    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn increment_with_expiry(
            &self,
            _key: &str,
            _ttl: Duration,
        ) -> Result<crate::store::WindowCount, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn set_add(&self, _set_key: &str, _member: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn set_contains(&self, _set_key: &str, _member: &str) -> Result<bool, StoreError> {
            Err(StoreError::Timeout(Duration::from_secs(1)))
        }

        fn backend(&self) -> &'static str {
            "down"
        }
    }

    fn metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new().unwrap())
    }

    #[tokio::test]
    async fn test_flag_then_lookup() {
        let shared = Arc::new(MemoryStore::default());
        let store = ReputationStore::new(
            shared.clone(),
            Arc::new(MemoryStore::default()),
            "suspicious-ips",
            metrics(),
        );

        assert!(!store.is_flagged("5.6.7.8").await);
        store.flag("5.6.7.8").await;
        assert!(store.is_flagged("5.6.7.8").await);
        assert!(!store.is_flagged("5.6.7.9").await);
        assert!(shared.set_contains("suspicious-ips", "5.6.7.8").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_fails_open() {
        let metrics = metrics();
        let store = ReputationStore::new(
            Arc::new(DownStore),
            Arc::new(MemoryStore::default()),
            "suspicious-ips",
            metrics.clone(),
        );

        assert!(!store.is_flagged("1.2.3.4").await);
        assert_eq!(
            metrics
                .store_failures
                .with_label_values(&["reputation"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_flag_during_outage_kept_locally() {
        let store = ReputationStore::new(
            Arc::new(DownStore),
            Arc::new(MemoryStore::default()),
            "suspicious-ips",
            metrics(),
        );

        store.flag("5.6.7.8").await;
        assert!(store.is_flagged("5.6.7.8").await);
        assert!(!store.is_flagged("1.2.3.4").await);
    }
}
