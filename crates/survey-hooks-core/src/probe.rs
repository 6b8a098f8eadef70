//! # Endpoint Probe Module
//!
//! Configuration-time reachability check for webhook delivery URLs.
//!
//! A probe performs exactly one outbound call and never retries. It is
//! notification-agnostic: callers decide whether an outcome is reported to an
//! operator (see [`crate::notifications`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{Duration, Instant},
};
use tracing::{debug, warn};
use url::Url;

/// Event name sent in the probe body
pub const PROBE_EVENT: &str = "testEndpoint";

// ============================================================================
// Core Types
// ============================================================================

/// Result of probing a candidate delivery URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The endpoint accepted the probe
    Reachable { status: u16, elapsed_ms: u64 },

    /// The endpoint could not be reached or refused the probe
    Unreachable { reason: UnreachableReason },
}

impl ProbeOutcome {
    /// Check if the endpoint accepted the probe
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }
}

/// Why a probe did not reach an accepting endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnreachableReason {
    /// The URL could not be parsed
    InvalidUrl { message: String },

    /// Only http and https endpoints can receive deliveries
    UnsupportedScheme { scheme: String },

    /// Connection, DNS or TLS failure
    Network { message: String },

    /// No response within the configured timeout
    Timeout { timeout_seconds: u64 },

    /// The endpoint answered with a non-success status
    Rejected { status: u16, body: String },
}

impl fmt::Display for UnreachableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { message } => write!(f, "invalid URL: {}", message),
            Self::UnsupportedScheme { scheme } => {
                write!(f, "unsupported URL scheme '{}'", scheme)
            }
            Self::Network { message } => write!(f, "network error: {}", message),
            Self::Timeout { timeout_seconds } => {
                write!(f, "no response within {} seconds", timeout_seconds)
            }
            Self::Rejected { status, body } if body.is_empty() => {
                write!(f, "endpoint responded with status {}", status)
            }
            Self::Rejected { status, body } => {
                write!(f, "endpoint responded with status {}: {}", status, body)
            }
        }
    }
}

/// Configuration for HTTP probing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Request timeout covering connect, send and response
    pub timeout_seconds: u64,

    /// User-Agent header sent with the probe
    pub user_agent: String,

    /// Maximum characters of a rejecting response body kept for diagnostics
    pub max_error_body_chars: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: format!("survey-hooks-probe/{}", env!("CARGO_PKG_VERSION")),
            max_error_body_chars: 256,
        }
    }
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Reachability check against a candidate delivery URL
///
/// Implementations perform a single call with no internal retry and must
/// always resolve to an outcome.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Probe the URL once
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// Probe that POSTs a JSON test event to the endpoint
///
/// Any 2xx status counts as reachable.
#[derive(Debug, Clone)]
pub struct HttpEndpointProbe {
    client: reqwest::Client,
    config: ProbeConfig,
}

impl HttpEndpointProbe {
    /// Create probe with its own HTTP client
    ///
    /// # Errors
    /// - `ProbeError::ClientBuild` - TLS backend or client settings unusable
    pub fn new(config: ProbeConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProbeError::ClientBuild {
                message: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    /// Active probe configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Read at most enough of a rejecting response to fill the diagnostic
    ///
    /// Chunks are pulled only until the byte budget is met, so an endpoint
    /// returning a huge body is never buffered in full.
    async fn read_error_body(&self, mut response: reqwest::Response) -> String {
        let max_chars = self.config.max_error_body_chars;
        // A UTF-8 character takes at most four bytes
        let max_bytes = max_chars.saturating_mul(4);

        let mut bytes = Vec::new();
        while bytes.len() < max_bytes {
            match response.chunk().await {
                Ok(Some(chunk)) => bytes.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Stopped reading rejection body");
                    break;
                }
            }
        }
        bytes.truncate(max_bytes);

        String::from_utf8_lossy(&bytes).chars().take(max_chars).collect()
    }
}

/// Parse and check a candidate delivery URL
pub fn parse_endpoint(url: &str) -> Result<Url, UnreachableReason> {
    let parsed = Url::parse(url.trim()).map_err(|e| UnreachableReason::InvalidUrl {
        message: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(UnreachableReason::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

#[async_trait]
impl EndpointProbe for HttpEndpointProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let target = match parse_endpoint(url) {
            Ok(target) => target,
            Err(reason) => {
                warn!(url = %url, reason = %reason, "Rejected probe target");
                return ProbeOutcome::Unreachable { reason };
            }
        };

        let started = Instant::now();
        let body = serde_json::json!({ "event": PROBE_EVENT });
        let result = self.client.post(target).json(&body).send().await;

        let outcome = match result {
            Ok(response) if response.status().is_success() => ProbeOutcome::Reachable {
                status: response.status().as_u16(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            Ok(response) => {
                let status = response.status().as_u16();
                let body = self.read_error_body(response).await;
                ProbeOutcome::Unreachable {
                    reason: UnreachableReason::Rejected { status, body },
                }
            }
            Err(e) if e.is_timeout() => ProbeOutcome::Unreachable {
                reason: UnreachableReason::Timeout {
                    timeout_seconds: self.config.timeout_seconds,
                },
            },
            Err(e) => ProbeOutcome::Unreachable {
                reason: UnreachableReason::Network {
                    message: e.to_string(),
                },
            },
        };

        match &outcome {
            ProbeOutcome::Reachable { status, elapsed_ms } => {
                debug!(url = %url, status, elapsed_ms, "Endpoint accepted probe")
            }
            ProbeOutcome::Unreachable { reason } => {
                warn!(url = %url, reason = %reason, "Endpoint probe failed")
            }
        }

        outcome
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors constructing a probe
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
