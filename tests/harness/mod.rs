// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for the anonymous inbox.
//!
//! Provides store doubles, payload generators and outcome tallies for
//! simulating abusive senders against the send pipeline.

#![allow(dead_code)]

pub mod generators;
pub mod metrics;
pub mod stores;

use anon_inbox::{
    config::Config, metrics::Metrics, store::CounterStore, AbuseController, InMemoryRepository,
    MemoryStore, OwnershipAuthorizer,
};
use std::sync::Arc;

/// Fully wired inbox over caller-chosen stores.
pub struct Inbox {
    pub controller: AbuseController,
    pub authorizer: OwnershipAuthorizer,
    pub repository: Arc<InMemoryRepository>,
    pub metrics: Arc<Metrics>,
}

impl Inbox {
    pub fn with_stores(shared: Arc<dyn CounterStore>, local: Arc<dyn CounterStore>) -> Self {
        Self::with_config(Config::default(), shared, local)
    }

    pub fn with_config(
        config: Config,
        shared: Arc<dyn CounterStore>,
        local: Arc<dyn CounterStore>,
    ) -> Self {
        let repository = Arc::new(InMemoryRepository::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let controller = AbuseController::from_config(
            &config,
            shared,
            local,
            repository.clone(),
            metrics.clone(),
        )
        .unwrap();
        let authorizer =
            OwnershipAuthorizer::from_config(&config, repository.clone(), metrics.clone());
        Self {
            controller,
            authorizer,
            repository,
            metrics,
        }
    }

    /// Inbox whose shared store is a healthy in-memory store.
    pub fn healthy() -> Self {
        Self::with_stores(
            Arc::new(MemoryStore::default()),
            Arc::new(MemoryStore::default()),
        )
    }
}
