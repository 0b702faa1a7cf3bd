// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Inbound payload validator.
//!
//! Implements structural validation for inbox requests:
//! - Owner / message identifier format
//! - Message body presence and length
//! - Answer body presence and length

use crate::config::ValidationConfig;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid identifier format for {param}")]
    MalformedId { param: &'static str },

    #[error("{0} cannot be empty")]
    EmptyBody(&'static str),

    #[error("{param} cannot exceed {max} characters (got {actual})")]
    TooLong {
        param: &'static str,
        max: usize,
        actual: usize,
    },
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Request is valid
    Valid,
    /// Request is invalid, with every reason found
    Invalid(Vec<ValidationError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(errors) => errors,
        }
    }

    fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(errors)
        }
    }
}

/// A send request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageInput {
    pub owner_id: String,
    pub body: String,
}

/// Payload validator for inbox requests.
#[derive(Debug, Clone)]
pub struct MessageValidator {
    config: ValidationConfig,
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl MessageValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate an identifier parameter (owner or message id).
    pub fn validate_id(&self, param: &'static str, value: Option<&str>) -> ValidationResult {
        ValidationResult::from_errors(check_id(param, value).into_iter().collect())
    }

    /// Validate a send-message payload.
    pub fn validate_send(&self, owner_id: Option<&str>, body: Option<&str>) -> ValidationResult {
        let mut errors = Vec::new();
        errors.extend(check_id("userId", owner_id));
        errors.extend(check_body("message", body, self.config.max_message_chars));

        if !errors.is_empty() {
            debug!(?errors, "Send payload invalid");
        }
        ValidationResult::from_errors(errors)
    }

    /// Validate an answer payload.
    pub fn validate_answer(&self, answer: Option<&str>) -> ValidationResult {
        ValidationResult::from_errors(
            check_body("answer", answer, self.config.max_answer_chars)
                .into_iter()
                .collect(),
        )
    }

    /// Validate and normalise a send-message payload.
    pub fn parse_send(
        &self,
        owner_id: Option<&str>,
        body: Option<&str>,
    ) -> Result<SendMessageInput, Vec<ValidationError>> {
        match (self.validate_send(owner_id, body), owner_id, body) {
            (ValidationResult::Valid, Some(owner_id), Some(body)) => Ok(SendMessageInput {
                owner_id: owner_id.trim().to_string(),
                body: body.to_string(),
            }),
            (ValidationResult::Invalid(errors), _, _) => Err(errors),
            // Valid implies both fields are present
            _ => Err(vec![ValidationError::MissingParameter("message")]),
        }
    }
}

fn check_id(param: &'static str, value: Option<&str>) -> Option<ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Some(ValidationError::MissingParameter(param)),
        Some(id) if Uuid::parse_str(id).is_err() => Some(ValidationError::MalformedId { param }),
        Some(_) => None,
    }
}

fn check_body(param: &'static str, value: Option<&str>, max: usize) -> Option<ValidationError> {
    let value = match value {
        Some(v) => v,
        None => return Some(ValidationError::MissingParameter(param)),
    };

    if value.trim().is_empty() {
        return Some(ValidationError::EmptyBody(param));
    }

    let actual = value.chars().count();
    if actual > max {
        return Some(ValidationError::TooLong { param, max, actual });
    }

    None
}
