//! # Webhook Subscription Manager
//!
//! The only path through which a webhook's configuration changes.
//!
//! Validation runs in a fixed order and stops at the first failure:
//!
//! 1. the webhook exists in the authorized environment
//! 2. the webhook is user-sourced
//! 3. at least one trigger is selected, and every trigger is in the catalog
//! 4. the resolved scope is `All` or a non-empty subset
//! 5. the candidate endpoint is reachable
//!
//! Only then is the configuration persisted, as a single replacement. Nothing
//! is written when any step fails. Deletion is held to the first two checks.

use crate::{
    access::{AccessError, AuthorizedEnvironment},
    probe::{EndpointProbe, ProbeOutcome, UnreachableReason},
    store::{StoreError, Survey, SurveyDirectory, WebhookStore},
    triggers::{TriggerCatalog, TriggerKind},
    webhook::{Webhook, WebhookCandidate, WebhookConfig, WebhookSource},
    ErrorCategory, WebhookId,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Orchestrates validation, probing and persistence of webhook configuration
#[derive(Clone)]
pub struct WebhookSubscriptionManager {
    store: Arc<dyn WebhookStore>,
    surveys: Arc<dyn SurveyDirectory>,
    probe: Arc<dyn EndpointProbe>,
    catalog: TriggerCatalog,
}

impl WebhookSubscriptionManager {
    /// Create manager from its collaborators
    pub fn new(
        store: Arc<dyn WebhookStore>,
        surveys: Arc<dyn SurveyDirectory>,
        probe: Arc<dyn EndpointProbe>,
        catalog: TriggerCatalog,
    ) -> Self {
        Self {
            store,
            surveys,
            probe,
            catalog,
        }
    }

    /// Trigger kinds a webhook may subscribe to
    pub fn catalog(&self) -> &TriggerCatalog {
        &self.catalog
    }

    /// Validate and commit a full replacement of a webhook's configuration
    ///
    /// # Errors
    /// - `NotFound` - Unknown webhook, or one owned by another environment
    /// - `ImmutableSource` - The webhook is not user-sourced; nothing is probed
    /// - `EmptyTriggerSet` / `UnknownTrigger` / `EmptyScopeSet` - Invalid
    ///   candidate; nothing is probed
    /// - `EndpointUnreachable` - Probe failed; nothing is written
    /// - `PersistenceFailure` - The store failed after validation passed
    #[instrument(
        skip(self, access, webhook_id, candidate),
        fields(
            webhook_id = %webhook_id,
            environment = %access.environment_id(),
            principal = %access.principal_id()
        )
    )]
    pub async fn propose_update(
        &self,
        access: AuthorizedEnvironment,
        webhook_id: &WebhookId,
        candidate: WebhookCandidate,
    ) -> Result<Webhook, WebhookSettingsError> {
        let webhook = self.load_in_environment(&access, webhook_id).await?;

        self.ensure_user_managed(&webhook, "update")?;

        let config = self.validate(&candidate)?;

        if let ProbeOutcome::Unreachable { reason } = self.probe.probe(&config.url).await {
            warn!(url = %config.url, reason = %reason, "Update rejected: endpoint unreachable");
            return Err(WebhookSettingsError::EndpointUnreachable {
                url: config.url,
                reason,
            });
        }

        let updated = self.store.update_webhook(webhook_id, config).await?;

        info!(
            url = %updated.url,
            triggers = updated.triggers.len(),
            all_surveys = updated.scope.is_all(),
            "Webhook configuration updated"
        );

        Ok(updated)
    }

    /// Check a candidate against the trigger and scope rules
    ///
    /// Returns the configuration that would be persisted. Performs no I/O.
    pub fn validate(
        &self,
        candidate: &WebhookCandidate,
    ) -> Result<WebhookConfig, WebhookSettingsError> {
        if candidate.triggers.is_empty() {
            debug!("Candidate has no triggers");
            return Err(WebhookSettingsError::EmptyTriggerSet);
        }

        if let Some(trigger) = self.catalog.first_unknown(&candidate.triggers) {
            debug!(trigger = %trigger, "Candidate selects unknown trigger");
            return Err(WebhookSettingsError::UnknownTrigger {
                trigger: trigger.clone(),
            });
        }

        let config = candidate.to_config();
        if config.scope.is_empty_subset() {
            debug!("Candidate selects no surveys");
            return Err(WebhookSettingsError::EmptyScopeSet);
        }

        Ok(config)
    }

    /// Permanently remove a webhook
    ///
    /// Not idempotent: deleting an already removed webhook fails `NotFound`.
    ///
    /// # Errors
    /// - `NotFound` - Unknown webhook, or one owned by another environment
    /// - `ImmutableSource` - The webhook is not user-sourced; nothing is removed
    /// - `PersistenceFailure` - The store failed to remove the document
    #[instrument(
        skip(self, access, webhook_id),
        fields(
            webhook_id = %webhook_id,
            environment = %access.environment_id(),
            principal = %access.principal_id()
        )
    )]
    pub async fn delete(
        &self,
        access: AuthorizedEnvironment,
        webhook_id: &WebhookId,
    ) -> Result<(), WebhookSettingsError> {
        let webhook = self.load_in_environment(&access, webhook_id).await?;
        self.ensure_user_managed(&webhook, "delete")?;

        self.store.delete_webhook(webhook_id).await?;

        info!("Webhook deleted");
        Ok(())
    }

    /// Read webhook detail
    #[instrument(
        skip(self, access, webhook_id),
        fields(webhook_id = %webhook_id, environment = %access.environment_id())
    )]
    pub async fn get(
        &self,
        access: AuthorizedEnvironment,
        webhook_id: &WebhookId,
    ) -> Result<Webhook, WebhookSettingsError> {
        self.load_in_environment(&access, webhook_id).await
    }

    /// List webhooks of the authorized environment
    #[instrument(skip(self, access), fields(environment = %access.environment_id()))]
    pub async fn list(
        &self,
        access: AuthorizedEnvironment,
    ) -> Result<Vec<Webhook>, WebhookSettingsError> {
        Ok(self.store.list_webhooks(access.environment_id()).await?)
    }

    /// Surveys an operator can pick from when narrowing the scope
    #[instrument(skip(self, access), fields(environment = %access.environment_id()))]
    pub async fn scope_candidates(
        &self,
        access: AuthorizedEnvironment,
    ) -> Result<Vec<Survey>, WebhookSettingsError> {
        Ok(self.surveys.list_surveys(access.environment_id()).await?)
    }

    /// Explicit manual reachability check
    ///
    /// The outcome is always returned; reporting it is up to the caller.
    #[instrument(skip(self, access), fields(environment = %access.environment_id()))]
    pub async fn check_endpoint(&self, access: AuthorizedEnvironment, url: &str) -> ProbeOutcome {
        self.probe.probe(url).await
    }

    fn ensure_user_managed(
        &self,
        webhook: &Webhook,
        action: &'static str,
    ) -> Result<(), WebhookSettingsError> {
        if webhook.source.is_user_managed() {
            return Ok(());
        }

        warn!(source = %webhook.source, action, "Rejected change of read-only webhook");
        Err(WebhookSettingsError::ImmutableSource {
            webhook_id: webhook.id.clone(),
            managed_by: webhook.source,
        })
    }

    async fn load_in_environment(
        &self,
        access: &AuthorizedEnvironment,
        webhook_id: &WebhookId,
    ) -> Result<Webhook, WebhookSettingsError> {
        let webhook = self.store.get_webhook(webhook_id).await?;

        if &webhook.environment_id != access.environment_id() {
            debug!(
                owner = %webhook.environment_id,
                "Webhook belongs to a different environment"
            );
            return Err(WebhookSettingsError::NotFound {
                webhook_id: webhook_id.clone(),
            });
        }

        Ok(webhook)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures of webhook configuration operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookSettingsError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not authorized: {0}")]
    NotAuthorized(AccessError),

    #[error("Webhook {webhook_id} is managed by source '{managed_by}' and cannot be changed")]
    ImmutableSource {
        webhook_id: WebhookId,
        managed_by: WebhookSource,
    },

    #[error("At least one trigger must be selected")]
    EmptyTriggerSet,

    #[error("Trigger '{trigger}' is not available")]
    UnknownTrigger { trigger: TriggerKind },

    #[error("At least one survey must be selected")]
    EmptyScopeSet,

    #[error("Endpoint {url} is unreachable: {reason}")]
    EndpointUnreachable {
        url: String,
        reason: UnreachableReason,
    },

    #[error("Webhook not found: {webhook_id}")]
    NotFound { webhook_id: WebhookId },

    #[error("Persistence failure: {message}")]
    PersistenceFailure { message: String, transient: bool },
}

impl WebhookSettingsError {
    /// Check if the operator can fix the input and try again
    ///
    /// Nothing was written for any recoverable error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmptyTriggerSet
                | Self::UnknownTrigger { .. }
                | Self::EmptyScopeSet
                | Self::EndpointUnreachable { .. }
        )
    }

    /// Get error category for operator feedback and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated | Self::NotAuthorized(_) => ErrorCategory::Authorization,
            Self::EmptyTriggerSet | Self::UnknownTrigger { .. } | Self::EmptyScopeSet => {
                ErrorCategory::Validation
            }
            Self::EndpointUnreachable { .. }
            | Self::PersistenceFailure {
                transient: true, ..
            } => ErrorCategory::Transient,
            Self::ImmutableSource { .. }
            | Self::NotFound { .. }
            | Self::PersistenceFailure {
                transient: false, ..
            } => ErrorCategory::Permanent,
        }
    }
}

impl From<AccessError> for WebhookSettingsError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::Unauthenticated => Self::Unauthenticated,
            other => Self::NotAuthorized(other),
        }
    }
}

impl From<StoreError> for WebhookSettingsError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { webhook_id } => Self::NotFound { webhook_id },
            other => Self::PersistenceFailure {
                transient: other.is_transient(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
