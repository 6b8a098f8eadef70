//! Tests for the webhook subscription manager.

use super::*;
use crate::{
    access::EnvironmentAccessGate,
    adapters::{InMemoryMembershipStore, InMemoryWebhookStore},
    scope::{ScopeSelection, SurveyScope},
    EnvironmentId, PrincipalId, SurveyId,
};
use async_trait::async_trait;
use std::sync::Mutex;

// ============================================================================
// Test Doubles
// ============================================================================

/// Probe returning a fixed outcome and recording every URL it was asked about
struct MockProbe {
    outcome: ProbeOutcome,
    calls: Mutex<Vec<String>>,
}

impl MockProbe {
    fn reachable() -> Self {
        Self {
            outcome: ProbeOutcome::Reachable {
                status: 200,
                elapsed_ms: 3,
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    fn unreachable() -> Self {
        Self {
            outcome: ProbeOutcome::Unreachable {
                reason: UnreachableReason::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                },
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn probed_urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EndpointProbe for MockProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        self.outcome.clone()
    }
}

/// Store whose reads succeed but whose writes always fail
struct ReadOnlyStore {
    inner: InMemoryWebhookStore,
}

#[async_trait]
impl WebhookStore for ReadOnlyStore {
    async fn get_webhook(&self, id: &WebhookId) -> Result<Webhook, StoreError> {
        self.inner.get_webhook(id).await
    }

    async fn update_webhook(
        &self,
        _id: &WebhookId,
        _config: WebhookConfig,
    ) -> Result<Webhook, StoreError> {
        Err(StoreError::Unavailable {
            message: "disk full".to_string(),
        })
    }

    async fn delete_webhook(&self, _id: &WebhookId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable {
            message: "disk full".to_string(),
        })
    }

    async fn list_webhooks(
        &self,
        environment_id: &EnvironmentId,
    ) -> Result<Vec<Webhook>, StoreError> {
        self.inner.list_webhooks(environment_id).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    store: InMemoryWebhookStore,
    probe: Arc<MockProbe>,
    gate: EnvironmentAccessGate,
    manager: WebhookSubscriptionManager,
}

impl Harness {
    fn new(probe: MockProbe) -> Self {
        let store = InMemoryWebhookStore::new();
        let probe = Arc::new(probe);
        let membership = InMemoryMembershipStore::with_grants([
            (principal(), env("env_1")),
            (principal(), env("env_2")),
        ]);

        let manager = WebhookSubscriptionManager::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            probe.clone(),
            TriggerCatalog::standard(),
        );

        Self {
            store,
            probe,
            gate: EnvironmentAccessGate::new(Arc::new(membership)),
            manager,
        }
    }

    async fn access(&self, environment: &str) -> AuthorizedEnvironment {
        self.gate
            .authorize(&principal(), &env(environment))
            .await
            .expect("test principal should be authorized")
    }
}

fn principal() -> PrincipalId {
    PrincipalId::new("alice").unwrap()
}

fn env(id: &str) -> EnvironmentId {
    EnvironmentId::new(id).unwrap()
}

fn wh_id(id: &str) -> WebhookId {
    WebhookId::new(id).unwrap()
}

fn trigger(tag: &str) -> TriggerKind {
    TriggerKind::new(tag).unwrap()
}

fn survey(id: &str) -> SurveyId {
    SurveyId::new(id).unwrap()
}

fn stored_webhook(id: &str, source: WebhookSource) -> Webhook {
    Webhook::new(wh_id(id), env("env_1"), source, "https://hooks.example.com/old")
        .with_name("Responses")
        .with_triggers([trigger("responseCreated")])
}

fn candidate(triggers: &[&str], scope: ScopeSelection) -> WebhookCandidate {
    WebhookCandidate::new(
        Some("Zapier".to_string()),
        "https://hooks.example.com/new",
        triggers.iter().map(|t| trigger(t)),
        scope,
    )
}

// ============================================================================
// propose_update
// ============================================================================

#[tokio::test]
async fn test_valid_update_is_probed_once_and_persisted() {
    let h = Harness::new(MockProbe::reachable());
    h.store.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();

    let updated = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_1"),
            candidate(
                &["responseCreated", "responseFinished"],
                ScopeSelection::subset([survey("s1"), survey("s2")]),
            ),
        )
        .await
        .unwrap();

    assert_eq!(h.probe.probed_urls(), vec!["https://hooks.example.com/new"]);
    assert_eq!(updated.name.as_deref(), Some("Zapier"));
    assert_eq!(updated.url, "https://hooks.example.com/new");
    assert_eq!(updated.triggers.len(), 2);
    assert_eq!(
        updated.scope,
        SurveyScope::from_survey_ids([survey("s1"), survey("s2")])
    );

    let stored = h.store.get_webhook(&wh_id("wh_1")).await.unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn test_empty_trigger_set_is_rejected_before_probing() {
    let h = Harness::new(MockProbe::reachable());
    let original = stored_webhook("wh_1", WebhookSource::User);
    h.store.insert(original.clone()).unwrap();

    let result = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_1"),
            candidate(&[], ScopeSelection::all()),
        )
        .await;

    assert_eq!(result.unwrap_err(), WebhookSettingsError::EmptyTriggerSet);
    assert_eq!(h.probe.call_count(), 0);
    assert_eq!(h.store.get_webhook(&wh_id("wh_1")).await.unwrap(), original);
}

#[tokio::test]
async fn test_empty_explicit_scope_is_rejected_before_probing() {
    let h = Harness::new(MockProbe::reachable());
    let original = stored_webhook("wh_1", WebhookSource::User);
    h.store.insert(original.clone()).unwrap();

    let result = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_1"),
            candidate(&["responseCreated"], ScopeSelection::subset([])),
        )
        .await;

    assert_eq!(result.unwrap_err(), WebhookSettingsError::EmptyScopeSet);
    assert_eq!(h.probe.call_count(), 0);
    assert_eq!(h.store.get_webhook(&wh_id("wh_1")).await.unwrap(), original);
}

#[tokio::test]
async fn test_trigger_check_runs_before_scope_check() {
    let h = Harness::new(MockProbe::reachable());
    h.store.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();

    let result = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_1"),
            candidate(&[], ScopeSelection::subset([])),
        )
        .await;

    assert_eq!(result.unwrap_err(), WebhookSettingsError::EmptyTriggerSet);
}

#[tokio::test]
async fn test_unknown_trigger_is_rejected() {
    let h = Harness::new(MockProbe::reachable());
    h.store.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();

    let result = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_1"),
            candidate(&["responseCreated", "surveyClosed"], ScopeSelection::all()),
        )
        .await;

    assert_eq!(
        result.unwrap_err(),
        WebhookSettingsError::UnknownTrigger {
            trigger: trigger("surveyClosed")
        }
    );
    assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_leaves_webhook_unchanged() {
    let h = Harness::new(MockProbe::unreachable());
    let original = stored_webhook("wh_1", WebhookSource::User);
    h.store.insert(original.clone()).unwrap();

    let result = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_1"),
            candidate(&["responseFinished"], ScopeSelection::all()),
        )
        .await;

    match result.unwrap_err() {
        WebhookSettingsError::EndpointUnreachable { url, reason } => {
            assert_eq!(url, "https://hooks.example.com/new");
            assert!(matches!(reason, UnreachableReason::Rejected { status: 500, .. }));
        }
        other => panic!("expected EndpointUnreachable, got {:?}", other),
    }
    assert_eq!(h.probe.call_count(), 1);
    assert_eq!(h.store.get_webhook(&wh_id("wh_1")).await.unwrap(), original);
}

#[tokio::test]
async fn test_system_webhook_is_immutable_and_never_probed() {
    let h = Harness::new(MockProbe::reachable());
    let original = stored_webhook("wh_sys", WebhookSource::System);
    h.store.insert(original.clone()).unwrap();

    let result = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_sys"),
            candidate(&["responseCreated"], ScopeSelection::all()),
        )
        .await;

    assert_eq!(
        result.unwrap_err(),
        WebhookSettingsError::ImmutableSource {
            webhook_id: wh_id("wh_sys"),
            managed_by: WebhookSource::System,
        }
    );
    assert_eq!(h.probe.call_count(), 0);
    assert_eq!(h.store.get_webhook(&wh_id("wh_sys")).await.unwrap(), original);
}

#[tokio::test]
async fn test_update_of_unknown_webhook_is_not_found() {
    let h = Harness::new(MockProbe::reachable());

    let result = h
        .manager
        .propose_update(
            h.access("env_1").await,
            &wh_id("wh_missing"),
            candidate(&["responseCreated"], ScopeSelection::all()),
        )
        .await;

    assert!(matches!(result, Err(WebhookSettingsError::NotFound { .. })));
    assert_eq!(h.probe.call_count(), 0);
}

#[tokio::test]
async fn test_webhook_of_other_environment_is_not_found() {
    let h = Harness::new(MockProbe::reachable());
    h.store.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();

    let result = h
        .manager
        .propose_update(
            h.access("env_2").await,
            &wh_id("wh_1"),
            candidate(&["responseCreated"], ScopeSelection::all()),
        )
        .await;
    assert!(matches!(result, Err(WebhookSettingsError::NotFound { .. })));

    let deleted = h.manager.delete(h.access("env_2").await, &wh_id("wh_1")).await;
    assert!(matches!(deleted, Err(WebhookSettingsError::NotFound { .. })));
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn test_persistence_failure_is_surfaced() {
    let inner = InMemoryWebhookStore::new();
    inner.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();
    let membership = InMemoryMembershipStore::with_grants([(principal(), env("env_1"))]);
    let gate = EnvironmentAccessGate::new(Arc::new(membership));
    let manager = WebhookSubscriptionManager::new(
        Arc::new(ReadOnlyStore {
            inner: inner.clone(),
        }),
        Arc::new(inner),
        Arc::new(MockProbe::reachable()),
        TriggerCatalog::standard(),
    );

    let access = gate.authorize(&principal(), &env("env_1")).await.unwrap();
    let result = manager
        .propose_update(
            access,
            &wh_id("wh_1"),
            candidate(&["responseCreated"], ScopeSelection::all()),
        )
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, WebhookSettingsError::PersistenceFailure { .. }));
    assert_eq!(error.error_category(), ErrorCategory::Transient);
}

#[tokio::test]
async fn test_blank_name_is_cleared_and_url_trimmed() {
    let h = Harness::new(MockProbe::reachable());
    h.store.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();

    let mut proposal = candidate(&["responseCreated"], ScopeSelection::all());
    proposal.name = Some("   ".to_string());
    proposal.url = "  https://hooks.example.com/new  ".to_string();

    let updated = h
        .manager
        .propose_update(h.access("env_1").await, &wh_id("wh_1"), proposal)
        .await
        .unwrap();

    assert_eq!(updated.name, None);
    assert_eq!(updated.url, "https://hooks.example.com/new");
    assert_eq!(h.probe.probed_urls(), vec!["https://hooks.example.com/new"]);
}

// ============================================================================
// delete / reads
// ============================================================================

#[tokio::test]
async fn test_second_delete_is_not_found() {
    let h = Harness::new(MockProbe::reachable());
    h.store.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();

    h.manager
        .delete(h.access("env_1").await, &wh_id("wh_1"))
        .await
        .unwrap();

    let second = h.manager.delete(h.access("env_1").await, &wh_id("wh_1")).await;
    assert_eq!(
        second.unwrap_err(),
        WebhookSettingsError::NotFound {
            webhook_id: wh_id("wh_1")
        }
    );
}

#[tokio::test]
async fn test_system_webhook_cannot_be_deleted() {
    let h = Harness::new(MockProbe::reachable());
    let original = stored_webhook("wh_sys", WebhookSource::System);
    h.store.insert(original.clone()).unwrap();

    let result = h.manager.delete(h.access("env_1").await, &wh_id("wh_sys")).await;

    assert_eq!(
        result.unwrap_err(),
        WebhookSettingsError::ImmutableSource {
            webhook_id: wh_id("wh_sys"),
            managed_by: WebhookSource::System,
        }
    );
    assert_eq!(h.store.get_webhook(&wh_id("wh_sys")).await.unwrap(), original);
}

#[tokio::test]
async fn test_failed_delete_is_transient_persistence_failure() {
    let inner = InMemoryWebhookStore::new();
    inner.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();
    let membership = InMemoryMembershipStore::with_grants([(principal(), env("env_1"))]);
    let gate = EnvironmentAccessGate::new(Arc::new(membership));
    let manager = WebhookSubscriptionManager::new(
        Arc::new(ReadOnlyStore {
            inner: inner.clone(),
        }),
        Arc::new(inner),
        Arc::new(MockProbe::reachable()),
        TriggerCatalog::standard(),
    );

    let access = gate.authorize(&principal(), &env("env_1")).await.unwrap();
    let error = manager.delete(access, &wh_id("wh_1")).await.unwrap_err();

    assert!(matches!(
        error,
        WebhookSettingsError::PersistenceFailure {
            transient: true,
            ..
        }
    ));
}

#[tokio::test]
async fn test_get_and_list_are_scoped_to_environment() {
    let h = Harness::new(MockProbe::reachable());
    h.store.insert(stored_webhook("wh_1", WebhookSource::User)).unwrap();
    h.store
        .insert(
            Webhook::new(wh_id("wh_2"), env("env_2"), WebhookSource::User, "https://b.example.com"),
        )
        .unwrap();

    let webhook = h.manager.get(h.access("env_1").await, &wh_id("wh_1")).await.unwrap();
    assert_eq!(webhook.id, wh_id("wh_1"));

    let listed = h.manager.list(h.access("env_2").await).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, wh_id("wh_2"));
}

#[tokio::test]
async fn test_scope_candidates_come_from_survey_directory() {
    let h = Harness::new(MockProbe::reachable());
    h.store
        .add_survey(Survey {
            id: survey("s1"),
            environment_id: env("env_1"),
            name: "NPS".to_string(),
        })
        .unwrap();

    let surveys = h.manager.scope_candidates(h.access("env_1").await).await.unwrap();
    assert_eq!(surveys.len(), 1);
    assert!(h
        .manager
        .scope_candidates(h.access("env_2").await)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_manual_endpoint_check_returns_outcome() {
    let h = Harness::new(MockProbe::unreachable());

    let outcome = h
        .manager
        .check_endpoint(h.access("env_1").await, "https://hooks.example.com/x")
        .await;

    assert!(!outcome.is_reachable());
    assert_eq!(h.probe.call_count(), 1);
}

// ============================================================================
// Error classification
// ============================================================================

#[test]
fn test_error_classification() {
    assert!(WebhookSettingsError::EmptyTriggerSet.is_recoverable());
    assert!(WebhookSettingsError::EmptyScopeSet.is_recoverable());
    assert!(!WebhookSettingsError::NotFound {
        webhook_id: wh_id("wh_1")
    }
    .is_recoverable());

    assert_eq!(
        WebhookSettingsError::from(AccessError::Unauthenticated),
        WebhookSettingsError::Unauthenticated
    );
    assert_eq!(
        WebhookSettingsError::from(AccessError::NotAuthorized {
            principal_id: principal(),
            environment_id: env("env_1"),
        })
        .error_category(),
        ErrorCategory::Authorization
    );
    assert_eq!(
        WebhookSettingsError::from(StoreError::NotFound {
            webhook_id: wh_id("wh_1")
        }),
        WebhookSettingsError::NotFound {
            webhook_id: wh_id("wh_1")
        }
    );

    let unavailable = WebhookSettingsError::from(StoreError::Unavailable {
        message: "disk busy".to_string(),
    });
    assert_eq!(unavailable.error_category(), ErrorCategory::Transient);

    let corrupt = WebhookSettingsError::from(StoreError::Serialization {
        message: "bad json".to_string(),
    });
    assert!(matches!(
        corrupt,
        WebhookSettingsError::PersistenceFailure {
            transient: false,
            ..
        }
    ));
    assert_eq!(corrupt.error_category(), ErrorCategory::Permanent);
    assert!(!corrupt.is_recoverable());
}
