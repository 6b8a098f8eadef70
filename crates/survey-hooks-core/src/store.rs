//! # Store Module
//!
//! Ports for the persistence layer and the survey directory.
//!
//! Both are owned outside the core. The survey directory is consulted only to
//! offer scope candidates; it never takes part in validating a configuration.

use crate::{
    webhook::{Webhook, WebhookConfig},
    EnvironmentId, SurveyId, WebhookId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// Survey as listed by the survey directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub environment_id: EnvironmentId,
    pub name: String,
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Persistence layer for webhook configuration
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Get webhook by ID
    ///
    /// # Errors
    /// - `StoreError::NotFound` - No webhook with this ID
    async fn get_webhook(&self, id: &WebhookId) -> Result<Webhook, StoreError>;

    /// Replace the webhook's configuration atomically
    ///
    /// Returns the stored webhook after the replacement. Concurrent updates
    /// are last-write-wins.
    ///
    /// # Errors
    /// - `StoreError::NotFound` - The webhook was removed in the meantime
    async fn update_webhook(
        &self,
        id: &WebhookId,
        config: WebhookConfig,
    ) -> Result<Webhook, StoreError>;

    /// Remove the webhook permanently
    ///
    /// # Errors
    /// - `StoreError::NotFound` - No webhook with this ID
    async fn delete_webhook(&self, id: &WebhookId) -> Result<(), StoreError>;

    /// List webhooks belonging to an environment
    async fn list_webhooks(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Webhook>, StoreError>;
}

/// Directory of surveys available in an environment
#[async_trait]
pub trait SurveyDirectory: Send + Sync {
    /// List surveys of an environment
    async fn list_surveys(&self, environment_id: &EnvironmentId)
        -> Result<Vec<Survey>, StoreError>;
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors reported by persistence adapters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Webhook not found: {webhook_id}")]
    NotFound { webhook_id: WebhookId },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Stored data could not be (de)serialized: {message}")]
    Serialization { message: String },

    #[error("Internal store error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Check if error is transient and the operation could be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
