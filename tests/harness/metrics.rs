// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome tallies for send simulations.

use anon_inbox::AppError;
use std::collections::HashMap;

/// Possible outcomes for a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    RateLimited,
    InvalidInput,
    NotFound,
    Degraded,
    Other,
}

impl Outcome {
    pub fn of<T>(result: &Result<T, AppError>) -> Self {
        match result {
            Ok(_) => Outcome::Accepted,
            Err(AppError::RateLimited { .. }) => Outcome::RateLimited,
            Err(AppError::InvalidInput(_)) => Outcome::InvalidInput,
            Err(AppError::NotFound) => Outcome::NotFound,
            Err(AppError::ServiceDegraded(_)) => Outcome::Degraded,
            Err(_) => Outcome::Other,
        }
    }
}

/// Counts outcomes per sender.
#[derive(Debug, Default)]
pub struct SendMetrics {
    outcomes: HashMap<Outcome, usize>,
    accepted_per_address: HashMap<String, usize>,
}

impl SendMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome, address: &str) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        if outcome == Outcome::Accepted {
            *self
                .accepted_per_address
                .entry(address.to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn accepted_for(&self, address: &str) -> usize {
        self.accepted_per_address.get(address).copied().unwrap_or(0)
    }

    pub fn max_accepted_per_address(&self) -> usize {
        self.accepted_per_address.values().copied().max().unwrap_or(0)
    }
}
