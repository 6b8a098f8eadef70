//! Common test utilities for survey-hooks integration tests
//!
//! This module provides:
//! - A fully wired settings service over in-memory or filesystem adapters
//! - A probe wrapper counting outbound probes
//! - Builders for webhooks and candidates

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use survey_hooks_core::{
    adapters::{FilesystemWebhookStore, InMemoryMembershipStore, InMemoryWebhookStore},
    EndpointProbe, EnvironmentAccessGate, EnvironmentId, HttpEndpointProbe, PrincipalId,
    ProbeConfig, ProbeOutcome, ScopeSelection, SurveyDirectory, TriggerCatalog, TriggerKind,
    Webhook, WebhookCandidate, WebhookId, WebhookSettingsService, WebhookSource, WebhookStore,
    WebhookSubscriptionManager,
};
use tempfile::TempDir;

pub const ENVIRONMENT: &str = "env_prod";
pub const OPERATOR: &str = "operator";
pub const OUTSIDER: &str = "outsider";

// ============================================================================
// Counting Probe
// ============================================================================

/// Real HTTP probe that records every URL it is asked to check
#[derive(Clone)]
pub struct CountingProbe {
    inner: Arc<HttpEndpointProbe>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl CountingProbe {
    pub fn new(timeout_seconds: u64) -> Self {
        let config = ProbeConfig {
            timeout_seconds,
            ..ProbeConfig::default()
        };

        Self {
            inner: Arc::new(HttpEndpointProbe::new(config).expect("probe client should build")),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EndpointProbe for CountingProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        self.inner.probe(url).await
    }
}

// ============================================================================
// Wired Service
// ============================================================================

/// Service plus handles on its collaborators
pub struct TestContext {
    pub service: WebhookSettingsService,
    pub store: Arc<dyn WebhookStore>,
    pub membership: InMemoryMembershipStore,
    pub probe: CountingProbe,
    /// Keeps a filesystem store's directory alive
    #[allow(dead_code)]
    pub data_dir: Option<TempDir>,
}

impl TestContext {
    /// Service over the in-memory store, seeded with the given webhooks
    #[allow(dead_code)]
    pub fn in_memory(webhooks: Vec<Webhook>) -> Self {
        let store = InMemoryWebhookStore::new();
        for webhook in webhooks {
            store.insert(webhook).expect("seed webhook");
        }

        let shared = Arc::new(store);
        Self::wire(shared.clone(), shared, None)
    }

    /// Service over a filesystem store in a fresh temporary directory
    #[allow(dead_code)]
    pub async fn on_filesystem(webhooks: Vec<Webhook>) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemWebhookStore::new(dir.path().to_path_buf())
            .await
            .expect("filesystem store");
        for webhook in &webhooks {
            store.insert(webhook).await.expect("seed webhook");
        }

        let shared = Arc::new(store);
        Self::wire(shared.clone(), shared, Some(dir))
    }

    fn wire(
        store: Arc<dyn WebhookStore>,
        surveys: Arc<dyn SurveyDirectory>,
        data_dir: Option<TempDir>,
    ) -> Self {
        let membership = InMemoryMembershipStore::with_grants([(operator(), environment())]);
        let probe = CountingProbe::new(2);

        let manager = WebhookSubscriptionManager::new(
            store.clone(),
            surveys,
            Arc::new(probe.clone()),
            TriggerCatalog::standard(),
        );
        let gate = EnvironmentAccessGate::new(Arc::new(membership.clone()));

        Self {
            service: WebhookSettingsService::new(gate, manager),
            store,
            membership,
            probe,
            data_dir,
        }
    }

    /// Stored webhook, bypassing the gate
    pub async fn stored(&self, id: &str) -> Webhook {
        self.store
            .get_webhook(&webhook_id(id))
            .await
            .expect("webhook should be stored")
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn environment() -> EnvironmentId {
    EnvironmentId::new(ENVIRONMENT).unwrap()
}

pub fn operator() -> PrincipalId {
    PrincipalId::new(OPERATOR).unwrap()
}

#[allow(dead_code)]
pub fn outsider() -> PrincipalId {
    PrincipalId::new(OUTSIDER).unwrap()
}

pub fn webhook_id(id: &str) -> WebhookId {
    WebhookId::new(id).unwrap()
}

pub fn trigger(tag: &str) -> TriggerKind {
    TriggerKind::new(tag).unwrap()
}

/// Webhook `{triggers: [responseCreated], surveyIds: []}` pointing at `url`
pub fn webhook(id: &str, source: WebhookSource, url: &str) -> Webhook {
    Webhook::new(webhook_id(id), environment(), source, url)
        .with_name("Delivery")
        .with_triggers([trigger("responseCreated")])
}

/// Candidate replacing url, triggers and scope
pub fn candidate(url: &str, triggers: &[&str], scope: ScopeSelection) -> WebhookCandidate {
    WebhookCandidate::new(
        Some("Delivery".to_string()),
        url,
        triggers.iter().map(|t| trigger(t)),
        scope,
    )
}
