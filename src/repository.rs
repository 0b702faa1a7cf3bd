// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persistence collaborator for owners and messages.
//!
//! The core only depends on [`MessageRepository`]. [`InMemoryRepository`]
//! backs the binary and the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Message already answered: {0}")]
    AlreadyAnswered(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Mailbox owner. The capability is never serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub capability: String,
}

/// Stored anonymous message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub owner_id: String,
    pub body: String,
    /// Sender address, kept for abuse handling only
    #[serde(skip_serializing)]
    pub source_address: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

/// Owner and message persistence.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Create an owner bound to `capability`.
    async fn create_owner(&self, capability: &str) -> Result<Owner, RepositoryError>;

    async fn find_owner(&self, owner_id: &str) -> Result<Option<Owner>, RepositoryError>;

    /// Capability bound to `owner_id`, if the owner exists.
    async fn find_owner_capability(&self, owner_id: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.find_owner(owner_id).await?.map(|owner| owner.capability))
    }

    async fn create_message(
        &self,
        owner_id: &str,
        body: &str,
        source_address: &str,
    ) -> Result<MessageRecord, RepositoryError>;

    /// Newest-first, at most `limit` records.
    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, RepositoryError>;

    /// Answered messages, most recently answered first, at most `limit`.
    async fn list_answered_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, RepositoryError>;

    async fn find_message_by_id(&self, id: &str) -> Result<Option<MessageRecord>, RepositoryError>;

    /// Record the answer for `id`. A message can be answered once.
    async fn set_answer(&self, id: &str, answer: &str) -> Result<MessageRecord, RepositoryError>;
}

#[derive(Debug)]
struct StoredMessage {
    record: MessageRecord,
    created_seq: u64,
    answered_seq: Option<u64>,
}

#[derive(Debug, Default)]
struct RepositoryState {
    owners: HashMap<String, Owner>,
    messages: HashMap<String, StoredMessage>,
    next_seq: u64,
}

impl RepositoryState {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Thread-safe in-memory repository.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<RepositoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryRepository {
    async fn create_owner(&self, capability: &str) -> Result<Owner, RepositoryError> {
        let owner = Owner {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            capability: capability.to_string(),
        };
        let mut state = self.state.write().await;
        state.owners.insert(owner.id.clone(), owner.clone());
        Ok(owner)
    }

    async fn find_owner(&self, owner_id: &str) -> Result<Option<Owner>, RepositoryError> {
        Ok(self.state.read().await.owners.get(owner_id).cloned())
    }

    async fn create_message(
        &self,
        owner_id: &str,
        body: &str,
        source_address: &str,
    ) -> Result<MessageRecord, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.owners.contains_key(owner_id) {
            return Err(RepositoryError::OwnerNotFound(owner_id.to_string()));
        }

        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            body: body.to_string(),
            source_address: source_address.to_string(),
            created_at: Utc::now(),
            answer: None,
            answered_at: None,
        };
        let created_seq = state.bump();
        state.messages.insert(
            record.id.clone(),
            StoredMessage {
                record: record.clone(),
                created_seq,
                answered_seq: None,
            },
        );
        Ok(record)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages: Vec<&StoredMessage> = state
            .messages
            .values()
            .filter(|m| m.record.owner_id == owner_id)
            .collect();
        messages.sort_by(|a, b| b.created_seq.cmp(&a.created_seq));
        Ok(messages
            .into_iter()
            .take(limit)
            .map(|m| m.record.clone())
            .collect())
    }

    async fn list_answered_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        let state = self.state.read().await;
        let mut answered: Vec<(u64, &MessageRecord)> = state
            .messages
            .values()
            .filter(|m| m.record.owner_id == owner_id)
            .filter_map(|m| m.answered_seq.map(|seq| (seq, &m.record)))
            .collect();
        answered.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(answered
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn find_message_by_id(&self, id: &str) -> Result<Option<MessageRecord>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .messages
            .get(id)
            .map(|m| m.record.clone()))
    }

    async fn set_answer(&self, id: &str, answer: &str) -> Result<MessageRecord, RepositoryError> {
        let mut state = self.state.write().await;
        let seq = state.bump();
        let stored = state
            .messages
            .get_mut(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.to_string()))?;

        if stored.record.answer.is_some() {
            return Err(RepositoryError::AlreadyAnswered(id.to_string()));
        }

        stored.record.answer = Some(answer.to_string());
        stored.record.answered_at = Some(Utc::now());
        stored.answered_seq = Some(seq);
        Ok(stored.record.clone())
    }
}
