//! # In-Memory Adapters
//!
//! Thread-safe in-memory implementations of the ports for testing and
//! development.

use crate::{
    access::{AccessError, MembershipStore, Principal, SessionProvider},
    store::{StoreError, Survey, SurveyDirectory, WebhookStore},
    webhook::{Webhook, WebhookConfig},
    EnvironmentId, PrincipalId, WebhookId,
};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Internal {
        message: "in-memory store lock poisoned".to_string(),
    }
}

// ============================================================================
// Webhook Store
// ============================================================================

/// Thread-safe in-memory webhook store and survey directory
///
/// Uses RwLock for concurrent access with minimal contention. Clones share
/// the same underlying data.
#[derive(Clone, Default)]
pub struct InMemoryWebhookStore {
    webhooks: Arc<RwLock<HashMap<WebhookId, Webhook>>>,
    surveys: Arc<RwLock<Vec<Survey>>>,
}

impl InMemoryWebhookStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a webhook as the provisioning path would
    pub fn insert(&self, webhook: Webhook) -> Result<(), StoreError> {
        self.webhooks
            .write()
            .map_err(poisoned)?
            .insert(webhook.id.clone(), webhook);
        Ok(())
    }

    /// Register a survey with the directory
    pub fn add_survey(&self, survey: Survey) -> Result<(), StoreError> {
        self.surveys.write().map_err(poisoned)?.push(survey);
        Ok(())
    }

    /// Number of stored webhooks
    pub fn len(&self) -> usize {
        self.webhooks.read().map(|w| w.len()).unwrap_or(0)
    }

    /// Check whether the store holds no webhooks
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn get_webhook(&self, id: &WebhookId) -> Result<Webhook, StoreError> {
        self.webhooks
            .read()
            .map_err(poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                webhook_id: id.clone(),
            })
    }

    async fn update_webhook(
        &self,
        id: &WebhookId,
        config: WebhookConfig,
    ) -> Result<Webhook, StoreError> {
        let mut webhooks = self.webhooks.write().map_err(poisoned)?;
        let webhook = webhooks.get_mut(id).ok_or_else(|| StoreError::NotFound {
            webhook_id: id.clone(),
        })?;

        webhook.apply(config);
        Ok(webhook.clone())
    }

    async fn delete_webhook(&self, id: &WebhookId) -> Result<(), StoreError> {
        self.webhooks
            .write()
            .map_err(poisoned)?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                webhook_id: id.clone(),
            })
    }

    async fn list_webhooks(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Webhook>, StoreError> {
        let mut webhooks: Vec<Webhook> = self
            .webhooks
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|w| &w.environment_id == environment_id)
            .cloned()
            .collect();

        webhooks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(webhooks)
    }
}

#[async_trait]
impl SurveyDirectory for InMemoryWebhookStore {
    async fn list_surveys(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Survey>, StoreError> {
        Ok(self
            .surveys
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|s| &s.environment_id == environment_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Membership
// ============================================================================

/// Static membership table
///
/// A principal has access to an environment only when an explicit grant
/// exists. Lookups are counted so tests can assert the gate never caches.
#[derive(Clone, Default)]
pub struct InMemoryMembershipStore {
    grants: Arc<RwLock<HashSet<(PrincipalId, EnvironmentId)>>>,
    lookups: Arc<RwLock<u64>>,
}

impl InMemoryMembershipStore {
    /// Create store with no grants
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store pre-populated with grants
    pub fn with_grants(grants: impl IntoIterator<Item = (PrincipalId, EnvironmentId)>) -> Self {
        let store = Self::new();
        if let Ok(mut table) = store.grants.write() {
            table.extend(grants);
        }
        store
    }

    /// Give a principal an access role on an environment
    pub fn grant(&self, principal_id: PrincipalId, environment_id: EnvironmentId) {
        if let Ok(mut table) = self.grants.write() {
            table.insert((principal_id, environment_id));
        }
    }

    /// Remove a principal's access role on an environment
    pub fn revoke(&self, principal_id: &PrincipalId, environment_id: &EnvironmentId) {
        if let Ok(mut table) = self.grants.write() {
            table.remove(&(principal_id.clone(), environment_id.clone()));
        }
    }

    /// Number of membership lookups served so far
    pub fn lookup_count(&self) -> u64 {
        self.lookups.read().map(|count| *count).unwrap_or(0)
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn has_access(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
    ) -> Result<bool, AccessError> {
        *self.lookups.write().map_err(membership_poisoned)? += 1;

        Ok(self
            .grants
            .read()
            .map_err(membership_poisoned)?
            .contains(&(principal_id.clone(), environment_id.clone())))
    }
}

fn membership_poisoned<T>(_: T) -> AccessError {
    AccessError::MembershipUnavailable {
        message: "membership table lock poisoned".to_string(),
    }
}

// ============================================================================
// Session
// ============================================================================

/// Session provider returning a fixed principal, or none
#[derive(Debug, Clone, Default)]
pub struct StaticSessionProvider {
    principal: Option<Principal>,
}

impl StaticSessionProvider {
    /// Session signed in as the given principal
    pub fn signed_in(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    /// Session with nobody signed in
    pub fn anonymous() -> Self {
        Self { principal: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_principal(&self) -> Option<Principal> {
        self.principal.clone()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
