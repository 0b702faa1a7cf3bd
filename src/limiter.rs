// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tiered fixed-window rate limiter.
//!
//! Two independent policies share one mechanism:
//! 1. `standard` for addresses with no reputation flag (10 per 60s default)
//! 2. `suspicious` for flagged addresses (1 per 300s default)
//!
//! Each consumption is a single atomic increment-with-expiry on the shared
//! store. A request is admitted iff the pre-increment count is below the
//! limit, i.e. the post-increment count is at most the limit. The window
//! starts at the first consumption after the previous one expired.
//!
//! When the shared store fails, the same key is counted in the process-local
//! store instead. That keeps each node self-protecting but gives no
//! cross-node guarantee; the switch is logged and exported as a metric.

use crate::config::{PolicyConfig, RateLimitConfig};
use crate::error::{AppError, Result};
use crate::metrics::Metrics;
use crate::store::{CounterStore, WindowCount};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Immutable fixed-window policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    limit: u32,
    window: Duration,
    key_prefix: String,
}

impl RateLimitPolicy {
    /// Create a policy.
    ///
    /// # Errors
    /// `ServiceDegraded` if `limit` or `window` is zero.
    pub fn new(limit: u32, window: Duration, key_prefix: impl Into<String>) -> Result<Self> {
        let key_prefix = key_prefix.into();
        if limit == 0 || window.is_zero() {
            return Err(AppError::ServiceDegraded(format!(
                "invalid rate limit policy {key_prefix}: limit {limit}, window {window:?}"
            )));
        }
        Ok(Self {
            limit,
            window,
            key_prefix,
        })
    }

    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        Self::new(
            config.limit,
            config.window_duration(),
            config.key_prefix.clone(),
        )
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn key(&self, address: &str) -> String {
        format!("{}:{}", self.key_prefix, address)
    }
}

/// Where a consumption was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementMode {
    /// Counted in the shared store, enforced across all nodes
    Distributed,
    /// Counted in this process only (shared store unreachable)
    LocalOnly,
}

impl EnforcementMode {
    fn label(self) -> &'static str {
        match self {
            Self::Distributed => "distributed",
            Self::LocalOnly => "local",
        }
    }
}

/// Result of a consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Allowed {
        /// Consumptions left in the current window
        remaining: u32,
        /// Time until the window resets
        reset_in: Duration,
        mode: EnforcementMode,
    },
    Denied {
        /// Lower bound on the wait before the next admission
        retry_after: Duration,
        mode: EnforcementMode,
    },
}

impl ConsumeOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn mode(&self) -> EnforcementMode {
        match self {
            Self::Allowed { mode, .. } | Self::Denied { mode, .. } => *mode,
        }
    }
}

/// Rate limiter holding the standard and suspicious tiers.
pub struct TieredRateLimiter {
    shared: Arc<dyn CounterStore>,
    local: Arc<dyn CounterStore>,
    standard: RateLimitPolicy,
    suspicious: RateLimitPolicy,
    local_mode: AtomicBool,
    metrics: Arc<Metrics>,
}

impl TieredRateLimiter {
    pub fn new(
        shared: Arc<dyn CounterStore>,
        local: Arc<dyn CounterStore>,
        standard: RateLimitPolicy,
        suspicious: RateLimitPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            shared,
            local,
            standard,
            suspicious,
            local_mode: AtomicBool::new(false),
            metrics,
        }
    }

    /// Build both tiers from configuration.
    ///
    /// # Errors
    /// `ServiceDegraded` if either policy is invalid.
    pub fn from_config(
        config: &RateLimitConfig,
        shared: Arc<dyn CounterStore>,
        local: Arc<dyn CounterStore>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        Ok(Self::new(
            shared,
            local,
            RateLimitPolicy::from_config(&config.standard)?,
            RateLimitPolicy::from_config(&config.suspicious)?,
            metrics,
        ))
    }

    pub fn standard(&self) -> &RateLimitPolicy {
        &self.standard
    }

    pub fn suspicious(&self) -> &RateLimitPolicy {
        &self.suspicious
    }

    /// Policy for an address given its reputation.
    pub fn select(&self, flagged: bool) -> &RateLimitPolicy {
        if flagged {
            &self.suspicious
        } else {
            &self.standard
        }
    }

    /// Current enforcement mode, as of the last consumption.
    pub fn mode(&self) -> EnforcementMode {
        if self.local_mode.load(Ordering::Acquire) {
            EnforcementMode::LocalOnly
        } else {
            EnforcementMode::Distributed
        }
    }

    /// Consume one unit of `policy` for `address`.
    ///
    /// # Errors
    /// `ServiceDegraded` if both the shared and the local store fail.
    pub async fn consume(&self, policy: &RateLimitPolicy, address: &str) -> Result<ConsumeOutcome> {
        let key = policy.key(address);

        let (window, mode) = match self.shared.increment_with_expiry(&key, policy.window).await {
            Ok(window) => {
                self.leave_local_mode();
                (window, EnforcementMode::Distributed)
            }
            Err(e) => {
                self.metrics
                    .store_failures
                    .with_label_values(&["limiter"])
                    .inc();
                self.enter_local_mode(&e);

                match self.local.increment_with_expiry(&key, policy.window).await {
                    Ok(window) => (window, EnforcementMode::LocalOnly),
                    Err(local_err) => {
                        error!(
                            shared_error = %e,
                            local_error = %local_err,
                            key = %key,
                            "Shared and local rate limit stores both failed"
                        );
                        return Err(AppError::ServiceDegraded(local_err.to_string()));
                    }
                }
            }
        };

        self.metrics
            .limiter_consumptions
            .with_label_values(&[mode.label()])
            .inc();

        Ok(decide(policy, window, mode, &key))
    }

    fn enter_local_mode(&self, cause: &crate::store::StoreError) {
        if !self.local_mode.swap(true, Ordering::AcqRel) {
            warn!(
                error = %cause,
                backend = self.shared.backend(),
                "Shared rate limit store unreachable, enforcing local-only limits"
            );
            self.metrics.local_mode.set(1);
        }
    }

    fn leave_local_mode(&self) {
        if self.local_mode.swap(false, Ordering::AcqRel) {
            info!(
                backend = self.shared.backend(),
                "Shared rate limit store recovered, distributed limits restored"
            );
            self.metrics.local_mode.set(0);
        }
    }
}

fn decide(
    policy: &RateLimitPolicy,
    window: WindowCount,
    mode: EnforcementMode,
    key: &str,
) -> ConsumeOutcome {
    let limit = u64::from(policy.limit);
    if window.count <= limit {
        let remaining = u32::try_from(limit - window.count).unwrap_or(0);
        debug!(key, count = window.count, remaining, ?mode, "Consumption allowed");
        ConsumeOutcome::Allowed {
            remaining,
            reset_in: window.expires_in,
            mode,
        }
    } else {
        debug!(key, count = window.count, retry_after = ?window.expires_in, ?mode, "Consumption denied");
        ConsumeOutcome::Denied {
            retry_after: window.expires_in,
            mode,
        }
    }
}
