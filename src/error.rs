// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome taxonomy surfaced to callers of the inbox core.

use crate::repository::RepositoryError;
use crate::validator::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Retryable once the current window elapses
    #[error("Too many requests, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Invalid input: {}", format_reasons(.0))]
    InvalidInput(Vec<ValidationError>),

    /// Capability missing or mismatched, or the resource does not exist
    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Message already answered")]
    AlreadyAnswered,

    /// Shared store unavailable and the local fallback cannot proceed either
    #[error("Service degraded: {0}")]
    ServiceDegraded(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::ServiceDegraded(_))
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(vec![err])
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OwnerNotFound(_) | RepositoryError::MessageNotFound(_) => {
                Self::NotFound
            }
            RepositoryError::AlreadyAnswered(_) => Self::AlreadyAnswered,
            RepositoryError::Backend(msg) => Self::Internal(msg),
        }
    }
}

fn format_reasons(reasons: &[ValidationError]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
