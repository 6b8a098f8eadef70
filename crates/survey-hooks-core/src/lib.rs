//! # Survey-Hooks Core
//!
//! Configuration-time contract for outbound survey webhooks.
//!
//! This crate decides which webhook configurations are legal and what must be
//! proven before one is committed: a non-empty trigger set drawn from the
//! trigger catalog, a well-formed survey scope, a reachable delivery endpoint,
//! and an authorized principal for the owning environment.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions ([`WebhookStore`],
//!   [`SurveyDirectory`], [`MembershipStore`], [`SessionProvider`],
//!   [`EndpointProbe`])
//! - Infrastructure implementations live in [`adapters`] and are injected at
//!   runtime
//! - Every manager operation consumes an [`AuthorizedEnvironment`] issued by
//!   the [`EnvironmentAccessGate`]
//!
//! ## Usage
//!
//! ```rust
//! use survey_hooks_core::{ScopeResolver, ScopeSelection, SurveyId, SurveyScope};
//!
//! let mut selection = ScopeSelection::all();
//! selection.toggle_all_surveys();
//! ScopeResolver::toggle(&mut selection, SurveyId::new("survey-1").unwrap());
//!
//! assert!(matches!(ScopeResolver::resolve(&selection), SurveyScope::Subset(_)));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use ulid::Ulid;

/// Maximum length of any opaque identifier accepted by the core
pub const MAX_ID_LENGTH: usize = 128;

// ============================================================================
// Domain Identifier Types
// ============================================================================

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create identifier with validation
            ///
            /// # Validation Rules
            /// - Must be 1-128 characters
            /// - Must contain only printable ASCII without whitespace
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                validate_identifier($field, value.into()).map(Self)
            }

            /// Get string representation
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

fn validate_identifier(field: &str, value: String) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: MAX_ID_LENGTH,
        });
    }

    if !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::InvalidCharacters {
            field: field.to_string(),
            invalid_chars: "non-ASCII or whitespace".to_string(),
        });
    }

    Ok(value)
}

opaque_id!(
    /// Unique identifier of a persisted webhook, immutable after creation
    WebhookId,
    "webhook_id"
);

impl WebhookId {
    /// Generate a new webhook ID
    ///
    /// Uses ULID for lexicographic sorting and global uniqueness. Only the
    /// provisioning path creates webhooks, so this is mostly used by fixtures.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }
}

opaque_id!(
    /// Environment identifier; the scoping boundary for authorization and
    /// survey membership
    EnvironmentId,
    "environment_id"
);

opaque_id!(
    /// Survey identifier; survey data itself is owned elsewhere
    SurveyId,
    "survey_id"
);

opaque_id!(
    /// Identifier of the acting principal (an authenticated user)
    PrincipalId,
    "principal_id"
);

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for operator feedback and alerting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The principal may not act on the environment
    Authorization,
    /// The submitted configuration is invalid; re-prompt the operator
    Validation,
    /// Temporary failures where retrying the same intent may succeed
    Transient,
    /// Failures that won't succeed on retry
    Permanent,
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Trigger catalog and trigger kinds
pub mod triggers;

/// Survey scope model and resolution of editing state
pub mod scope;

/// Endpoint reachability probing
pub mod probe;

/// Webhook data model and configuration candidates
pub mod webhook;

/// Persistence and survey directory ports
pub mod store;

/// Environment access gate and principal/session ports
pub mod access;

/// Webhook subscription manager, the sole mutation path
pub mod manager;

/// Operator feedback vocabulary for presentation layers
pub mod notifications;

/// Guarded entry points combining the gate and the manager
pub mod service;

/// Layered settings loading
pub mod config;

/// Infrastructure adapters for the ports
pub mod adapters;

// Re-export key types for convenience
pub use access::{
    AccessError, AuthorizedEnvironment, EnvironmentAccessGate, MembershipStore, Principal,
    SessionProvider,
};
pub use manager::{WebhookSettingsError, WebhookSubscriptionManager};
pub use notifications::{Feedback, FeedbackSink, ProbeMode};
pub use probe::{EndpointProbe, HttpEndpointProbe, ProbeConfig, ProbeOutcome, UnreachableReason};
pub use scope::{ScopeResolver, ScopeSelection, SurveyScope};
pub use service::WebhookSettingsService;
pub use store::{StoreError, Survey, SurveyDirectory, WebhookStore};
pub use triggers::{CatalogError, TriggerCatalog, TriggerKind};
pub use webhook::{Webhook, WebhookCandidate, WebhookConfig, WebhookSource};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
