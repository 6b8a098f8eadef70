//! # Webhook Settings Service
//!
//! Single guarded entry point for presentation layers. Every method first
//! authorizes the principal for the environment, then runs exactly one
//! manager operation with the fresh capability.

use crate::{
    access::EnvironmentAccessGate,
    manager::{WebhookSettingsError, WebhookSubscriptionManager},
    probe::ProbeOutcome,
    store::Survey,
    triggers::TriggerCatalog,
    webhook::{Webhook, WebhookCandidate},
    EnvironmentId, PrincipalId, WebhookId,
};
use tracing::instrument;

/// Gate-then-act facade over the manager
#[derive(Clone)]
pub struct WebhookSettingsService {
    gate: EnvironmentAccessGate,
    manager: WebhookSubscriptionManager,
}

impl WebhookSettingsService {
    pub fn new(gate: EnvironmentAccessGate, manager: WebhookSubscriptionManager) -> Self {
        Self { gate, manager }
    }

    /// Webhook detail
    #[instrument(
        skip(self, principal_id, environment_id),
        fields(principal = %principal_id, environment = %environment_id)
    )]
    pub async fn get_webhook(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
        webhook_id: &WebhookId,
    ) -> Result<Webhook, WebhookSettingsError> {
        let access = self.gate.authorize(principal_id, environment_id).await?;
        self.manager.get(access, webhook_id).await
    }

    /// All webhooks of the environment
    #[instrument(
        skip(self, principal_id, environment_id),
        fields(principal = %principal_id, environment = %environment_id)
    )]
    pub async fn list_webhooks(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Webhook>, WebhookSettingsError> {
        let access = self.gate.authorize(principal_id, environment_id).await?;
        self.manager.list(access).await
    }

    /// Validate, probe and commit a replacement configuration
    #[instrument(
        skip(self, principal_id, environment_id, candidate),
        fields(principal = %principal_id, environment = %environment_id)
    )]
    pub async fn update_webhook(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
        webhook_id: &WebhookId,
        candidate: WebhookCandidate,
    ) -> Result<Webhook, WebhookSettingsError> {
        let access = self.gate.authorize(principal_id, environment_id).await?;
        self.manager
            .propose_update(access, webhook_id, candidate)
            .await
    }

    /// Permanently remove a webhook
    #[instrument(
        skip(self, principal_id, environment_id),
        fields(principal = %principal_id, environment = %environment_id)
    )]
    pub async fn delete_webhook(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
        webhook_id: &WebhookId,
    ) -> Result<(), WebhookSettingsError> {
        let access = self.gate.authorize(principal_id, environment_id).await?;
        self.manager.delete(access, webhook_id).await
    }

    /// Manual reachability check of a URL
    #[instrument(
        skip(self, principal_id, environment_id),
        fields(principal = %principal_id, environment = %environment_id)
    )]
    pub async fn test_endpoint(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
        url: &str,
    ) -> Result<ProbeOutcome, WebhookSettingsError> {
        let access = self.gate.authorize(principal_id, environment_id).await?;
        Ok(self.manager.check_endpoint(access, url).await)
    }

    /// Surveys available for narrowing a webhook's scope
    pub async fn scope_candidates(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Survey>, WebhookSettingsError> {
        let access = self.gate.authorize(principal_id, environment_id).await?;
        self.manager.scope_candidates(access).await
    }

    /// Trigger kinds offered to operators of the environment
    pub async fn trigger_catalog(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
    ) -> Result<TriggerCatalog, WebhookSettingsError> {
        self.gate.authorize(principal_id, environment_id).await?;
        Ok(self.manager.catalog().clone())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
