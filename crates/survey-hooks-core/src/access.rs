//! # Environment Access Module
//!
//! Authorization of a principal against an environment.
//!
//! The [`EnvironmentAccessGate`] is the only issuer of
//! [`AuthorizedEnvironment`] capabilities. Manager operations require one and
//! consume it, so every read or mutation is preceded by its own membership
//! lookup and no call site can skip the check.

use crate::{EnvironmentId, PrincipalId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

// ============================================================================
// Core Types
// ============================================================================

/// Authenticated actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Principal {
    /// Create principal without a display name
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            display_name: None,
        }
    }
}

/// Proof that a principal passed the gate for one environment
///
/// Not `Clone`, and only the gate can construct one. Each manager operation
/// consumes its capability, so the next operation has to authorize again.
#[derive(Debug)]
pub struct AuthorizedEnvironment {
    principal_id: PrincipalId,
    environment_id: EnvironmentId,
}

impl AuthorizedEnvironment {
    fn new(principal_id: PrincipalId, environment_id: EnvironmentId) -> Self {
        Self {
            principal_id,
            environment_id,
        }
    }

    /// Principal that was authorized
    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    /// Environment the principal may act on
    pub fn environment_id(&self) -> &EnvironmentId {
        &self.environment_id
    }
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Source of the current session's principal
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Principal of the current session, if any
    async fn current_principal(&self) -> Option<Principal>;
}

/// External membership store
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Check whether the principal holds any access role on the environment
    ///
    /// Unknown environments are reported as `Ok(false)`.
    async fn has_access(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
    ) -> Result<bool, AccessError>;
}

// ============================================================================
// Gate
// ============================================================================

/// Authorizes principals per environment; fails closed
#[derive(Clone)]
pub struct EnvironmentAccessGate {
    membership: Arc<dyn MembershipStore>,
}

impl EnvironmentAccessGate {
    /// Create gate backed by a membership store
    pub fn new(membership: Arc<dyn MembershipStore>) -> Self {
        Self { membership }
    }

    /// Authorize a principal for an environment
    ///
    /// Queries the membership store on every call; results are never cached.
    ///
    /// # Errors
    /// - `AccessError::NotAuthorized` - No access role, or unknown environment
    /// - `AccessError::MembershipUnavailable` - Lookup failed; access is denied
    #[instrument(
        skip(self, principal_id, environment_id),
        fields(principal = %principal_id, environment = %environment_id)
    )]
    pub async fn authorize(
        &self,
        principal_id: &PrincipalId,
        environment_id: &EnvironmentId,
    ) -> Result<AuthorizedEnvironment, AccessError> {
        match self.membership.has_access(principal_id, environment_id).await {
            Ok(true) => {
                debug!("Principal authorized for environment");
                Ok(AuthorizedEnvironment::new(
                    principal_id.clone(),
                    environment_id.clone(),
                ))
            }
            Ok(false) => {
                warn!("Principal has no access role on environment");
                Err(AccessError::NotAuthorized {
                    principal_id: principal_id.clone(),
                    environment_id: environment_id.clone(),
                })
            }
            Err(e) => {
                warn!(error = %e, "Membership lookup failed; denying access");
                Err(match e {
                    AccessError::MembershipUnavailable { message } => {
                        AccessError::MembershipUnavailable { message }
                    }
                    other => AccessError::MembershipUnavailable {
                        message: other.to_string(),
                    },
                })
            }
        }
    }

    /// Authorize whoever owns the current session
    ///
    /// # Errors
    /// - `AccessError::Unauthenticated` - No session; the caller should send
    ///   the user to the login entry point
    /// - Any error from [`Self::authorize`]
    pub async fn authorize_session(
        &self,
        session: &dyn SessionProvider,
        environment_id: &EnvironmentId,
    ) -> Result<AuthorizedEnvironment, AccessError> {
        let principal = session
            .current_principal()
            .await
            .ok_or(AccessError::Unauthenticated)?;

        self.authorize(&principal.id, environment_id).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Reasons the gate refuses access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("No authenticated session")]
    Unauthenticated,

    #[error("Principal {principal_id} is not authorized for environment {environment_id}")]
    NotAuthorized {
        principal_id: PrincipalId,
        environment_id: EnvironmentId,
    },

    #[error("Membership store unavailable: {message}")]
    MembershipUnavailable { message: String },
}

#[cfg(test)]
#[path = "access_tests.rs"]
mod tests;
