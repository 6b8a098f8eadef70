//! # Notifications Module
//!
//! Operator feedback produced by presentation layers.
//!
//! The manager never reports anything itself; front ends map operation
//! results to [`Feedback`] with the helpers below and hand it to a
//! [`FeedbackSink`].

use crate::{manager::WebhookSettingsError, probe::ProbeOutcome, webhook::Webhook};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message shown to an operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum Feedback {
    Success(String),
    Error(String),
}

impl Feedback {
    /// Check if this is a failure message
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Message text
    pub fn message(&self) -> &str {
        match self {
            Self::Success(message) | Self::Error(message) => message,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Why a probe was run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Gate inside an update; only failures are reported
    PreSubmitGate,
    /// Operator asked explicitly; success and failure are reported
    ManualCheck,
}

/// Fire-and-forget destination for operator feedback
pub trait FeedbackSink: Send + Sync {
    /// Deliver one message
    fn notify(&self, feedback: Feedback);
}

/// Feedback for a probe outcome, if the mode reports it
pub fn probe_feedback(mode: ProbeMode, outcome: &ProbeOutcome) -> Option<Feedback> {
    match (outcome, mode) {
        (ProbeOutcome::Reachable { .. }, ProbeMode::ManualCheck) => {
            Some(Feedback::Success("Webhook endpoint is reachable".to_string()))
        }
        (ProbeOutcome::Reachable { .. }, ProbeMode::PreSubmitGate) => None,
        (ProbeOutcome::Unreachable { reason }, _) => Some(Feedback::Error(format!(
            "Unable to reach the webhook endpoint: {}",
            reason
        ))),
    }
}

/// Feedback for an update attempt
pub fn update_feedback(result: &Result<Webhook, WebhookSettingsError>) -> Feedback {
    match result {
        Ok(_) => Feedback::Success("Webhook updated successfully".to_string()),
        Err(error) => error_feedback(error),
    }
}

/// Feedback for a delete attempt
pub fn delete_feedback(result: &Result<(), WebhookSettingsError>) -> Feedback {
    match result {
        Ok(()) => Feedback::Success("Webhook deleted successfully".to_string()),
        Err(error) => error_feedback(error),
    }
}

fn error_feedback(error: &WebhookSettingsError) -> Feedback {
    let message = match error {
        WebhookSettingsError::EmptyTriggerSet => "Please select at least one trigger".to_string(),
        WebhookSettingsError::EmptyScopeSet => "Please select at least one survey".to_string(),
        WebhookSettingsError::EndpointUnreachable { reason, .. } => {
            format!("Unable to reach the webhook endpoint: {}", reason)
        }
        WebhookSettingsError::Unauthenticated => "Please sign in to continue".to_string(),
        WebhookSettingsError::NotAuthorized(_) => {
            "You are not authorized to manage webhooks in this environment".to_string()
        }
        other => other.to_string(),
    };

    Feedback::Error(message)
}

#[cfg(test)]
#[path = "notifications_tests.rs"]
mod tests;
