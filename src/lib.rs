// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Anonymous Inbox
//!
//! Receives anonymous messages through a public link and keeps replies
//! readable only by the mailbox owner. The abuse path combines:
//!
//! - Reputation lookup against a shared suspicious-address set
//! - Tiered fixed-window rate limiting (10 per 60s standard, 1 per 300s suspicious)
//! - A keyword heuristic that flags senders without ever blocking delivery
//! - Capability tokens gating mailbox reads and answer writes
//!
//! Shared state lives in Redis when reachable. When it is not, reputation
//! lookups fail open and rate limits are enforced with process-local counters.

pub mod abuse;
pub mod authz;
pub mod classifier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod repository;
pub mod reputation;
pub mod store;
pub mod validator;

pub use abuse::{AbuseController, Accepted};
pub use authz::{Authorization, OwnershipAuthorizer};
pub use classifier::{ContentClassifier, Verdict};
pub use config::Config;
pub use error::{AppError, Result};
pub use limiter::{ConsumeOutcome, EnforcementMode, RateLimitPolicy, TieredRateLimiter};
pub use repository::{InMemoryRepository, MessageRecord, MessageRepository};
pub use reputation::ReputationStore;
pub use store::{CounterStore, MemoryStore, RedisStore, StoreError};
pub use validator::{MessageValidator, ValidationError};
