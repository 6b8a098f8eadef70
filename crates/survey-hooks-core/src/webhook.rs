//! # Webhook Model Module
//!
//! Persisted webhook subscriptions and the replacement intents submitted
//! against them.

use crate::{
    scope::{ScopeResolver, ScopeSelection, SurveyScope},
    triggers::TriggerKind,
    EnvironmentId, ParseError, Timestamp, WebhookId,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

// ============================================================================
// Source Provenance
// ============================================================================

/// Who provisioned the webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookSource {
    /// Created by an operator; fully editable
    User,
    /// Provisioned by an integration; read-only and cannot be deleted
    System,
}

impl WebhookSource {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }

    /// Check whether operators may change the configuration
    pub fn is_user_managed(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl fmt::Display for WebhookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WebhookSource {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            _ => Err(ParseError::InvalidFormat {
                expected: "user or system".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Persisted Webhook
// ============================================================================

/// A persisted webhook subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub environment_id: EnvironmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    pub source: WebhookSource,
    pub triggers: BTreeSet<TriggerKind>,
    /// Empty list on the wire means every survey in the environment
    #[serde(rename = "survey_ids", default = "all_surveys")]
    pub scope: SurveyScope,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn all_surveys() -> SurveyScope {
    SurveyScope::All
}

impl Webhook {
    /// Create a webhook as the provisioning path would
    ///
    /// Starts with no triggers and all surveys in scope.
    pub fn new(
        id: WebhookId,
        environment_id: EnvironmentId,
        source: WebhookSource,
        url: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            environment_id,
            name: None,
            url: url.into(),
            source,
            triggers: BTreeSet::new(),
            scope: SurveyScope::All,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the subscribed triggers
    pub fn with_triggers(mut self, triggers: impl IntoIterator<Item = TriggerKind>) -> Self {
        self.triggers = triggers.into_iter().collect();
        self
    }

    /// Set the survey scope
    pub fn with_scope(mut self, scope: SurveyScope) -> Self {
        self.scope = scope;
        self
    }

    /// Current configuration, as it would be replaced by an update
    pub fn config(&self) -> WebhookConfig {
        WebhookConfig {
            name: self.name.clone(),
            url: self.url.clone(),
            triggers: self.triggers.clone(),
            scope: self.scope.clone(),
        }
    }

    /// Replace the configuration wholesale and stamp the update time
    pub fn apply(&mut self, config: WebhookConfig) {
        self.name = config.name;
        self.url = config.url;
        self.triggers = config.triggers;
        self.scope = config.scope;
        self.updated_at = Timestamp::now();
    }
}

/// Full configuration written by an update
///
/// Updates have no partial semantics: every field replaces the prior value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    pub triggers: BTreeSet<TriggerKind>,
    #[serde(rename = "survey_ids")]
    pub scope: SurveyScope,
}

// ============================================================================
// Update Intent
// ============================================================================

/// Configuration an operator proposes for an existing webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookCandidate {
    pub name: Option<String>,
    pub url: String,
    pub triggers: BTreeSet<TriggerKind>,
    pub scope_selection: ScopeSelection,
}

impl WebhookCandidate {
    /// Create candidate from explicit values
    pub fn new(
        name: Option<String>,
        url: impl Into<String>,
        triggers: impl IntoIterator<Item = TriggerKind>,
        scope_selection: ScopeSelection,
    ) -> Self {
        Self {
            name,
            url: url.into(),
            triggers: triggers.into_iter().collect(),
            scope_selection,
        }
    }

    /// Seed editing state from the stored webhook
    pub fn from_webhook(webhook: &Webhook) -> Self {
        Self {
            name: webhook.name.clone(),
            url: webhook.url.clone(),
            triggers: webhook.triggers.clone(),
            scope_selection: ScopeSelection::from_scope(&webhook.scope),
        }
    }

    /// Add the trigger if absent, remove it if present
    pub fn toggle_trigger(&mut self, kind: TriggerKind) {
        if !self.triggers.remove(&kind) {
            self.triggers.insert(kind);
        }
    }

    /// Name with surrounding whitespace removed; blank names become `None`
    pub fn normalized_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Configuration this candidate would persist
    pub fn to_config(&self) -> WebhookConfig {
        WebhookConfig {
            name: self.normalized_name(),
            url: self.url.trim().to_string(),
            triggers: self.triggers.clone(),
            scope: ScopeResolver::resolve(&self.scope_selection),
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
