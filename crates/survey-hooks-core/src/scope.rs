//! # Survey Scope Module
//!
//! Which surveys a webhook subscription applies to.
//!
//! Persisted webhooks carry a list of survey IDs where an empty list means
//! "every survey in the environment". Inside the core that convention is
//! replaced by [`SurveyScope`], so "all surveys" and "nothing selected yet"
//! can never be confused. [`ScopeSelection`] is the editing state a
//! presentation layer mutates, and [`ScopeResolver`] turns it into a scope.

use crate::SurveyId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Persisted Scope
// ============================================================================

/// Effective survey scope of a webhook
///
/// Serializes through the persisted `survey_ids` list: `All` is written as an
/// empty list and an empty list is read back as `All`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SurveyId>", into = "Vec<SurveyId>")]
pub enum SurveyScope {
    /// Every survey in the webhook's environment
    All,
    /// Only the listed surveys
    Subset(BTreeSet<SurveyId>),
}

impl SurveyScope {
    /// Build scope from the persisted survey ID list
    pub fn from_survey_ids(ids: impl IntoIterator<Item = SurveyId>) -> Self {
        let ids: BTreeSet<SurveyId> = ids.into_iter().collect();
        if ids.is_empty() {
            Self::All
        } else {
            Self::Subset(ids)
        }
    }

    /// Convert to the persisted survey ID list
    pub fn to_survey_ids(&self) -> Vec<SurveyId> {
        match self {
            Self::All => Vec::new(),
            Self::Subset(ids) => ids.iter().cloned().collect(),
        }
    }

    /// Check whether the scope covers every survey
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Check whether an event for the given survey falls inside this scope
    pub fn includes(&self, survey_id: &SurveyId) -> bool {
        match self {
            Self::All => true,
            Self::Subset(ids) => ids.contains(survey_id),
        }
    }

    /// A subset with no surveys; never valid for commit
    pub fn is_empty_subset(&self) -> bool {
        matches!(self, Self::Subset(ids) if ids.is_empty())
    }
}

impl From<Vec<SurveyId>> for SurveyScope {
    fn from(ids: Vec<SurveyId>) -> Self {
        Self::from_survey_ids(ids)
    }
}

impl From<SurveyScope> for Vec<SurveyId> {
    fn from(scope: SurveyScope) -> Self {
        scope.to_survey_ids()
    }
}

// ============================================================================
// Editing State
// ============================================================================

/// Transient scope editing state
///
/// Flipping the "all surveys" toggle in either direction discards the explicit
/// selection, so switching to a subset always starts with nothing selected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScopeSelection {
    all_surveys: bool,
    explicit_survey_ids: BTreeSet<SurveyId>,
}

impl ScopeSelection {
    /// Selection covering every survey
    pub fn all() -> Self {
        Self {
            all_surveys: true,
            explicit_survey_ids: BTreeSet::new(),
        }
    }

    /// Selection of explicit surveys
    pub fn subset(ids: impl IntoIterator<Item = SurveyId>) -> Self {
        Self {
            all_surveys: false,
            explicit_survey_ids: ids.into_iter().collect(),
        }
    }

    /// Initial editing state for an existing scope
    pub fn from_scope(scope: &SurveyScope) -> Self {
        match scope {
            SurveyScope::All => Self::all(),
            SurveyScope::Subset(ids) => Self::subset(ids.iter().cloned()),
        }
    }

    /// Whether the "all surveys" toggle is on
    pub fn all_surveys(&self) -> bool {
        self.all_surveys
    }

    /// Explicitly selected surveys (possibly stale while `all_surveys` is on)
    pub fn explicit_survey_ids(&self) -> &BTreeSet<SurveyId> {
        &self.explicit_survey_ids
    }

    /// Flip the "all surveys" toggle, clearing the explicit selection
    pub fn toggle_all_surveys(&mut self) {
        self.set_all_surveys(!self.all_surveys);
    }

    /// Set the "all surveys" toggle; a change of value clears the explicit selection
    pub fn set_all_surveys(&mut self, all_surveys: bool) {
        if self.all_surveys != all_surveys {
            self.all_surveys = all_surveys;
            self.explicit_survey_ids.clear();
        }
    }

    /// Add the survey if absent, remove it if present
    ///
    /// Leaves the "all surveys" toggle untouched.
    pub fn toggle_survey(&mut self, survey_id: SurveyId) {
        if !self.explicit_survey_ids.remove(&survey_id) {
            self.explicit_survey_ids.insert(survey_id);
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Translates editing state into the effective scope
pub struct ScopeResolver;

impl ScopeResolver {
    /// Resolve a selection into a scope
    ///
    /// With "all surveys" on, stale explicit IDs are ignored. Otherwise the
    /// explicit IDs are returned verbatim, even when empty; rejecting an empty
    /// subset is the manager's job.
    pub fn resolve(selection: &ScopeSelection) -> SurveyScope {
        if selection.all_surveys {
            SurveyScope::All
        } else {
            SurveyScope::Subset(selection.explicit_survey_ids.clone())
        }
    }

    /// Membership toggle for a single survey
    pub fn toggle(selection: &mut ScopeSelection, survey_id: SurveyId) {
        selection.toggle_survey(survey_id);
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
