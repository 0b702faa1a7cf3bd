// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Capability-token authorization for mailbox reads and answer writes.
//!
//! Fails closed: a missing token, a missing owner or message, a mismatched
//! token and a persistence failure all produce the same `Forbidden`.
//! Tokens are compared in constant time.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::metrics::Metrics;
use crate::repository::{MessageRecord, MessageRepository, RepositoryError};
use crate::validator::{MessageValidator, ValidationResult};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error};

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized,
    Denied,
}

/// Gates owner-only operations on a presented capability token.
pub struct OwnershipAuthorizer {
    repository: Arc<dyn MessageRepository>,
    validator: MessageValidator,
    page_size: usize,
    metrics: Arc<Metrics>,
}

impl OwnershipAuthorizer {
    pub fn new(
        repository: Arc<dyn MessageRepository>,
        validator: MessageValidator,
        page_size: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repository,
            validator,
            page_size,
            metrics,
        }
    }

    pub fn from_config(
        config: &Config,
        repository: Arc<dyn MessageRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::new(
            repository,
            MessageValidator::new(config.validation.clone()),
            config.mailbox.page_size,
            metrics,
        )
    }

    /// Compare `presented` against the capability bound to `owner_id`.
    pub async fn authorize(&self, owner_id: &str, presented: Option<&str>) -> Authorization {
        let presented = match presented {
            Some(token) if !token.is_empty() => token,
            _ => return Authorization::Denied,
        };

        let stored = match self.repository.find_owner_capability(owner_id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Authorization::Denied,
            Err(e) => {
                error!(error = %e, owner_id, "Capability lookup failed, denying");
                return Authorization::Denied;
            }
        };

        if bool::from(stored.as_bytes().ct_eq(presented.as_bytes())) {
            Authorization::Authorized
        } else {
            Authorization::Denied
        }
    }

    /// Newest-first messages of `owner_id`, capped at the page size.
    pub async fn read_mailbox(
        &self,
        owner_id: &str,
        presented: Option<&str>,
    ) -> Result<Vec<MessageRecord>> {
        if self.authorize(owner_id, presented).await == Authorization::Denied {
            return Err(self.forbidden("mailbox_read", owner_id));
        }

        let messages = self
            .repository
            .list_by_owner(owner_id, self.page_size)
            .await?;
        debug!(owner_id, count = messages.len(), "Mailbox read");
        Ok(messages)
    }

    /// Answer `message_id`, authorized against the message owner's capability.
    pub async fn answer_message(
        &self,
        message_id: &str,
        answer: Option<&str>,
        presented: Option<&str>,
    ) -> Result<MessageRecord> {
        if let ValidationResult::Invalid(errors) = self.validator.validate_answer(answer) {
            return Err(AppError::InvalidInput(errors));
        }
        let answer = answer.unwrap_or_default();

        let message = match self.repository.find_message_by_id(message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => return Err(self.forbidden("answer", message_id)),
            Err(e) => {
                error!(error = %e, message_id, "Message lookup failed, denying");
                return Err(self.forbidden("answer", message_id));
            }
        };

        if self.authorize(&message.owner_id, presented).await == Authorization::Denied {
            return Err(self.forbidden("answer", message_id));
        }

        match self.repository.set_answer(message_id, answer).await {
            Ok(record) => {
                debug!(message_id, "Message answered");
                Ok(record)
            }
            Err(RepositoryError::MessageNotFound(_)) => Err(self.forbidden("answer", message_id)),
            Err(e) => Err(e.into()),
        }
    }

    fn forbidden(&self, operation: &'static str, resource: &str) -> AppError {
        debug!(operation, resource, "Forbidden");
        self.metrics.forbidden.inc();
        AppError::Forbidden
    }
}
