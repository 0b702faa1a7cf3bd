// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the anonymous inbox service.
//!
//! Default rate-limit values are the two production tiers:
//! 10 sends per 60 seconds for ordinary addresses, 1 send per
//! 300 seconds for addresses flagged as suspicious.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the anonymous inbox service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Use the first `X-Forwarded-For` hop as the client address (default: false)
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Shared counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Payload validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Mailbox read configuration
    #[serde(default)]
    pub mailbox: MailboxConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Shared store (Redis) and local fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL (default: redis://127.0.0.1:6379/)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Per-call timeout for store operations in milliseconds (default: 1000)
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,

    /// Key of the suspicious address set (default: suspicious-ips)
    #[serde(default = "default_suspicious_set_key")]
    pub suspicious_set_key: String,

    /// Maximum live keys held by the process-local fallback store (default: 100000)
    #[serde(default = "default_local_max_keys")]
    pub local_max_keys: usize,
}

/// One fixed-window policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Admitted consumptions per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// Counter key prefix in the shared store
    pub key_prefix: String,
}

/// Rate limiting configuration for both tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tier applied to addresses with no reputation flag
    #[serde(default = "default_standard_policy")]
    pub standard: PolicyConfig,

    /// Tier applied to flagged addresses
    #[serde(default = "default_suspicious_policy")]
    pub suspicious: PolicyConfig,
}

/// Validation limits for inbound payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum message length in characters (default: 500)
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Maximum answer length in characters (default: 1000)
    #[serde(default = "default_max_answer_chars")]
    pub max_answer_chars: usize,
}

/// Mailbox read configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Maximum records returned by one mailbox read (default: 50)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_store_timeout_ms() -> u64 {
    1000
}

fn default_suspicious_set_key() -> String {
    "suspicious-ips".to_string()
}

fn default_local_max_keys() -> usize {
    100_000
}

fn default_standard_policy() -> PolicyConfig {
    PolicyConfig {
        limit: 10,
        window_secs: 60,
        key_prefix: "rate-limiter:standard".to_string(),
    }
}

fn default_suspicious_policy() -> PolicyConfig {
    PolicyConfig {
        limit: 1,
        window_secs: 300,
        key_prefix: "rate-limiter:suspicious".to_string(),
    }
}

fn default_max_message_chars() -> usize {
    500
}

fn default_max_answer_chars() -> usize {
    1000
}

fn default_page_size() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            trust_forwarded_for: false,
            store: StoreConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            mailbox: MailboxConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            timeout_ms: default_store_timeout_ms(),
            suspicious_set_key: default_suspicious_set_key(),
            local_max_keys: default_local_max_keys(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            standard: default_standard_policy(),
            suspicious: default_suspicious_policy(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
            max_answer_chars: default_max_answer_chars(),
        }
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl StoreConfig {
    /// Get the per-call store timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PolicyConfig {
    /// Get the window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
