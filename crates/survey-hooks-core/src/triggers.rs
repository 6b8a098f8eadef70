//! # Trigger Catalog Module
//!
//! The enumerable set of survey lifecycle events a webhook may subscribe to.
//!
//! Trigger kinds are an open enumeration: a validated string tag that must be
//! present in a catalog supplied at runtime. The core never attaches behavior
//! to a particular kind beyond membership checks, so the catalog can grow
//! through configuration alone.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Emitted when a new response is created for a survey
pub const RESPONSE_CREATED: &str = "responseCreated";

/// Emitted when an existing response receives more answers
pub const RESPONSE_UPDATED: &str = "responseUpdated";

/// Emitted when a respondent completes a survey
pub const RESPONSE_FINISHED: &str = "responseFinished";

/// Catalog used when no catalog is configured
pub const DEFAULT_TRIGGERS: &[&str] = &[RESPONSE_CREATED, RESPONSE_UPDATED, RESPONSE_FINISHED];

const MAX_TRIGGER_LENGTH: usize = 64;

// ============================================================================
// Core Types
// ============================================================================

/// Name of a survey lifecycle event eligible for subscription
///
/// Tags are 1-64 characters of printable ASCII without whitespace.
/// Membership in a [`TriggerCatalog`] is checked separately.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TriggerKind(String);

impl TriggerKind {
    /// Create trigger kind with tag validation
    pub fn new(tag: impl Into<String>) -> Result<Self, CatalogError> {
        let tag = tag.into();

        if tag.is_empty() {
            return Err(CatalogError::InvalidTrigger {
                value: tag,
                reason: "trigger tag cannot be empty".to_string(),
            });
        }

        if tag.len() > MAX_TRIGGER_LENGTH {
            return Err(CatalogError::InvalidTrigger {
                value: tag,
                reason: format!("trigger tag exceeds {} characters", MAX_TRIGGER_LENGTH),
            });
        }

        if !tag.chars().all(|c| c.is_ascii_graphic()) {
            return Err(CatalogError::InvalidTrigger {
                value: tag,
                reason: "trigger tag contains whitespace or non-ASCII characters".to_string(),
            });
        }

        Ok(Self(tag))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TriggerKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TriggerKind {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TriggerKind> for String {
    fn from(kind: TriggerKind) -> Self {
        kind.0
    }
}

/// Externally curated set of trigger kinds
///
/// Immutable once built; a new catalog is constructed when configuration
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCatalog {
    kinds: BTreeSet<TriggerKind>,
}

impl TriggerCatalog {
    /// Create catalog from trigger kinds
    ///
    /// # Errors
    /// - `CatalogError::EmptyCatalog` - No trigger kinds supplied
    pub fn new(kinds: impl IntoIterator<Item = TriggerKind>) -> Result<Self, CatalogError> {
        let kinds: BTreeSet<TriggerKind> = kinds.into_iter().collect();
        if kinds.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }
        Ok(Self { kinds })
    }

    /// Create catalog from raw tags, validating each one
    pub fn from_tags<I, S>(tags: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kinds = tags
            .into_iter()
            .map(TriggerKind::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(kinds)
    }

    /// Catalog of response lifecycle events
    pub fn standard() -> Self {
        Self {
            kinds: DEFAULT_TRIGGERS
                .iter()
                .map(|tag| TriggerKind(tag.to_string()))
                .collect(),
        }
    }

    /// Check whether the trigger kind is part of this catalog
    pub fn contains(&self, kind: &TriggerKind) -> bool {
        self.kinds.contains(kind)
    }

    /// Look up a catalog entry by its tag
    pub fn get(&self, tag: &str) -> Option<&TriggerKind> {
        self.kinds.iter().find(|kind| kind.as_str() == tag)
    }

    /// Verify every selected trigger is known to the catalog
    ///
    /// # Errors
    /// - `CatalogError::UnknownTrigger` - First selected trigger not in the catalog
    pub fn ensure_known<'a>(
        &self,
        selected: impl IntoIterator<Item = &'a TriggerKind>,
    ) -> Result<(), CatalogError> {
        match self.first_unknown(selected) {
            Some(unknown) => Err(CatalogError::UnknownTrigger {
                trigger: unknown.clone(),
            }),
            None => Ok(()),
        }
    }

    /// First selected trigger missing from the catalog, in selection order
    pub fn first_unknown<'a>(
        &self,
        selected: impl IntoIterator<Item = &'a TriggerKind>,
    ) -> Option<&'a TriggerKind> {
        selected.into_iter().find(|kind| !self.contains(kind))
    }

    /// Iterate trigger kinds in stable order
    pub fn iter(&self) -> impl Iterator<Item = &TriggerKind> {
        self.kinds.iter()
    }

    /// Number of trigger kinds in the catalog
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false for a constructed catalog
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for TriggerCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building or consulting a trigger catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid trigger '{value}': {reason}")]
    InvalidTrigger { value: String, reason: String },

    #[error("Unknown trigger: {trigger}")]
    UnknownTrigger { trigger: TriggerKind },

    #[error("Trigger catalog must contain at least one trigger")]
    EmptyCatalog,
}

#[cfg(test)]
#[path = "triggers_tests.rs"]
mod tests;
