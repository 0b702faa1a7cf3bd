// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Send-message pipeline.
//!
//! Strictly sequential, no step is revisited:
//! 1. Reputation lookup (fails open)
//! 2. Policy selection: flagged -> suspicious, else standard
//! 3. Consumption; a denial ends the request with no side effects
//! 4. Payload validation
//! 5. Persistence, regardless of content
//! 6. Classification; a spammy body flags the sender (best-effort) and the
//!    triggering message opens the sender's suspicious window
//! 7. Accept with the new message id
//!
//! Spam never blocks delivery. It only slows the sender's future sends.

use crate::classifier::ContentClassifier;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::limiter::{ConsumeOutcome, TieredRateLimiter};
use crate::metrics::Metrics;
use crate::repository::MessageRepository;
use crate::reputation::ReputationStore;
use crate::store::CounterStore;
use crate::validator::MessageValidator;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub message_id: String,
    /// The body was classified as spammy and the sender was flagged
    pub sender_flagged: bool,
}

/// Orchestrates reputation, rate limiting, validation, persistence and
/// classification for inbound messages.
pub struct AbuseController {
    reputation: ReputationStore,
    limiter: TieredRateLimiter,
    classifier: ContentClassifier,
    validator: MessageValidator,
    repository: Arc<dyn MessageRepository>,
    metrics: Arc<Metrics>,
}

impl AbuseController {
    pub fn new(
        reputation: ReputationStore,
        limiter: TieredRateLimiter,
        classifier: ContentClassifier,
        validator: MessageValidator,
        repository: Arc<dyn MessageRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            reputation,
            limiter,
            classifier,
            validator,
            repository,
            metrics,
        }
    }

    /// Wire a controller from configuration and its collaborators.
    ///
    /// # Errors
    /// `ServiceDegraded` if a rate limit policy is invalid.
    pub fn from_config(
        config: &Config,
        shared: Arc<dyn CounterStore>,
        local: Arc<dyn CounterStore>,
        repository: Arc<dyn MessageRepository>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let limiter = TieredRateLimiter::from_config(
            &config.rate_limit,
            shared.clone(),
            local.clone(),
            metrics.clone(),
        )?;
        let reputation = ReputationStore::new(
            shared,
            local,
            config.store.suspicious_set_key.clone(),
            metrics.clone(),
        );

        Ok(Self::new(
            reputation,
            limiter,
            ContentClassifier::default(),
            MessageValidator::new(config.validation.clone()),
            repository,
            metrics,
        ))
    }

    pub fn reputation(&self) -> &ReputationStore {
        &self.reputation
    }

    pub fn limiter(&self) -> &TieredRateLimiter {
        &self.limiter
    }

    /// Handle one send-message request from `address`.
    pub async fn send_message(
        &self,
        address: &str,
        owner_id: Option<&str>,
        body: Option<&str>,
    ) -> Result<Accepted> {
        let result = self.process(address, owner_id, body).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(AppError::RateLimited { .. }) => "rate_limited",
            Err(AppError::InvalidInput(_)) => "invalid_input",
            Err(AppError::NotFound) => "not_found",
            Err(AppError::ServiceDegraded(_)) => "degraded",
            Err(_) => "error",
        };
        self.metrics
            .send_outcomes
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn process(
        &self,
        address: &str,
        owner_id: Option<&str>,
        body: Option<&str>,
    ) -> Result<Accepted> {
        let flagged = self.reputation.is_flagged(address).await;
        let policy = self.limiter.select(flagged);

        if let ConsumeOutcome::Denied { retry_after, mode } =
            self.limiter.consume(policy, address).await?
        {
            info!(
                address,
                flagged,
                retry_after_secs = retry_after.as_secs(),
                ?mode,
                "Send rate limited"
            );
            return Err(AppError::RateLimited { retry_after });
        }

        let input = self
            .validator
            .parse_send(owner_id, body)
            .map_err(AppError::InvalidInput)?;

        let record = self
            .repository
            .create_message(&input.owner_id, &input.body, address)
            .await?;

        let verdict = self.classifier.classify(&input.body);
        if verdict.is_spammy() {
            debug!(
                address,
                message_id = %record.id,
                keywords = ?self.classifier.matches(&input.body),
                "Spammy body, flagging sender"
            );
            self.reputation.flag(address).await;
            self.open_suspicious_window(address).await;
        }

        debug!(address, message_id = %record.id, "Message accepted");
        Ok(Accepted {
            message_id: record.id,
            sender_flagged: verdict.is_spammy(),
        })
    }

    /// Charge the flagging message to the suspicious tier, so the sender's
    /// next send falls in an already-used window.
    async fn open_suspicious_window(&self, address: &str) {
        let policy = self.limiter.suspicious();
        if let Err(e) = self.limiter.consume(policy, address).await {
            warn!(error = %e, address, "Could not open suspicious window");
        }
    }
}
